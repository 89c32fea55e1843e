use tracing_subscriber::EnvFilter;

/// Filter directives for the fmt subscriber, e.g. `ARTISAN_LOG=debug,reqwest=warn`.
pub const LOG_ENV: &str = "ARTISAN_LOG";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
