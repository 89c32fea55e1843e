use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use artisan_bot::commands::Request;
use artisan_bot::config::{init_config, load_config};
use artisan_bot::{build_dispatcher, server, telemetry};
use artisan_core::Account;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "artisan", about = "Member skill registry driven by chat commands")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an example configuration file.
    Init {
        #[arg(default_value = "artisan.yaml")]
        path: PathBuf,
    },
    /// Accept newline-delimited JSON commands over TCP.
    Serve {
        #[arg(long, short, env = "ARTISAN_CONFIG", default_value = "artisan.yaml")]
        config: PathBuf,
        /// Overrides `listen` from the config file.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Run a single command and print the reply as JSON.
    Run {
        #[arg(long, short, env = "ARTISAN_CONFIG", default_value = "artisan.yaml")]
        config: PathBuf,
        /// member-update, member-search or admin-logs
        command: String,
        /// Command options as a JSON object.
        #[arg(long, default_value = "{}")]
        options: String,
        #[arg(long)]
        account_id: String,
        #[arg(long)]
        display_name: String,
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();
    match args.cmd {
        Command::Init { path } => {
            init_config(&path)?;
            println!("Wrote example configuration to {}", path.display());
            Ok(())
        }
        Command::Serve { config, listen } => {
            let config = load_config(&config)?;
            let addr = listen.unwrap_or(config.listen);
            let dispatcher = Arc::new(build_dispatcher(&config).await?);
            server::serve(addr, dispatcher).await
        }
        Command::Run {
            config,
            command,
            options,
            account_id,
            display_name,
            roles,
        } => {
            let config = load_config(&config)?;
            let dispatcher = build_dispatcher(&config).await?;
            let options = serde_json::from_str(&options).with_context(|| "--options must be JSON")?;
            let account = roles
                .into_iter()
                .fold(Account::new(account_id, display_name), Account::with_role);
            let reply = dispatcher.handle(Request { command, options, account }).await;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
    }
}
