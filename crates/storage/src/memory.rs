use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use artisan_core::SheetValues;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::traits::TableStore;

/// Process-local sheets. Counts bulk writes so callers can assert on them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sheets: RwLock<HashMap<String, SheetValues>>,
    loads: AtomicU64,
    stores: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, store_id: &str, values: SheetValues) {
        self.sheets.write().await.insert(store_id.to_string(), values);
    }

    pub async fn snapshot(&self, store_id: &str) -> SheetValues {
        self.sheets
            .read()
            .await
            .get(store_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn store_count(&self) -> u64 {
        self.stores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn load_table(&self, store_id: &str) -> Result<SheetValues, StorageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot(store_id).await)
    }

    async fn store_table(&self, store_id: &str, values: &[Vec<String>]) -> Result<(), StorageError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.sheets
            .write()
            .await
            .insert(store_id.to_string(), values.to_vec());
        Ok(())
    }
}
