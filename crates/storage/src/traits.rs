use artisan_core::SheetValues;
use async_trait::async_trait;

use crate::error::StorageError;

/// A remote tabular store. Only whole-sheet reads and writes exist.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Header row first. A sheet that was never written yields no rows.
    async fn load_table(&self, store_id: &str) -> Result<SheetValues, StorageError>;

    /// Replaces the sheet contents with `values`.
    async fn store_table(&self, store_id: &str, values: &[Vec<String>]) -> Result<(), StorageError>;
}
