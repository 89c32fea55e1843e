pub mod app;
pub mod commands;
pub mod config;
pub mod logs;
pub mod server;
pub mod telemetry;

pub use app::build_dispatcher;
pub use commands::{Command, CommandError, Dispatcher, Request};
pub use config::{BotConfig, StoreConfig, load_config};
pub use logs::{FileSink, LogAction, LogCommand, LogsRequest};
