use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("duplicate column in header: {0}")]
    DuplicateColumn(String),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

impl CoreError {
    /// Header/schema mismatches. No command can proceed safely past one.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::ColumnNotFound(_) | Self::DuplicateColumn(_))
    }
}
