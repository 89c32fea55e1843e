use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] gcp_auth::Error),

    #[error("backing store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("table {store_id} changed underneath us after {attempts} attempt(s)")]
    Conflict { store_id: String, attempts: u32 },

    #[error("invalid store configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Background(String),

    #[error("core error: {0}")]
    Core(#[from] artisan_core::CoreError),
}
