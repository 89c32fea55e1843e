use artisan_core::CoreError;
use artisan_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("no record with discord_id {identity}")]
    RecordNotFound { identity: String },

    #[error("invalid columns: {}", columns.join(", "))]
    InvalidColumns { columns: Vec<String> },

    #[error("{name} is owned by {owner}")]
    PermissionDenied { name: String, owner: String },

    #[error("member name is empty")]
    EmptyName,

    #[error("render failed: {0}")]
    Render(String),
}

impl EngineError {
    /// The sheet header does not match what the engine expects.
    pub fn is_schema_error(&self) -> bool {
        match self {
            Self::Core(e) | Self::Storage(StorageError::Core(e)) => e.is_schema_error(),
            _ => false,
        }
    }
}
