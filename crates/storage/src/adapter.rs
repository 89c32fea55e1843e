use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use artisan_core::table::fingerprint_values;
use artisan_core::{CoreError, Table};

use crate::error::StorageError;
use crate::traits::TableStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    /// Re-read the sheet before writing and retry if it moved.
    pub verify_before_write: bool,
    pub max_attempts: u32,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self { verify_before_write: true, max_attempts: 3 }
    }
}

/// What a modification wants done with the table it was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition<T> {
    Write(T),
    Discard(T),
}

/// Whole-table access to a backend with one writer per table.
///
/// Writers for the same `store_id` queue on an async mutex. Writers in
/// other processes are caught by comparing a fingerprint of the sheet at
/// load time against a fresh read just before write-back.
pub struct RowStore {
    backend: Arc<dyn TableStore>,
    policy: WritePolicy,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RowStore {
    pub fn new(backend: Arc<dyn TableStore>, policy: WritePolicy) -> Self {
        Self {
            backend,
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn writer_lock(&self, store_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(store_id.to_string()).or_default())
    }

    /// Fresh snapshot for read-only commands. Takes no writer lock.
    pub async fn load(&self, store_id: &str) -> Result<Table, StorageError> {
        let values = self.backend.load_table(store_id).await?;
        Ok(Table::from_values(values)?)
    }

    /// Load, apply `f`, and write the whole table back if `f` asks for it.
    ///
    /// `f` may run more than once when a concurrent writer is detected; each
    /// run sees a freshly loaded table. An `Err` from `f` aborts with
    /// nothing written.
    pub async fn modify<T, E, F>(&self, store_id: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut(&mut Table) -> Result<Disposition<T>, E>,
        E: From<StorageError> + From<CoreError>,
    {
        let lock = self.writer_lock(store_id);
        let _writer = lock.lock().await;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let values = self.backend.load_table(store_id).await?;
            let seen = fingerprint_values(&values);
            let mut table = Table::from_values(values)?;

            let value = match f(&mut table)? {
                Disposition::Discard(value) => return Ok(value),
                Disposition::Write(value) => value,
            };

            if self.policy.verify_before_write {
                let current = self.backend.load_table(store_id).await?;
                if fingerprint_values(&current) != seen {
                    tracing::warn!(store_id, attempt, max_attempts, "table changed since load");
                    if attempt >= max_attempts {
                        return Err(StorageError::Conflict {
                            store_id: store_id.to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }
                    continue;
                }
            }

            self.backend.store_table(store_id, &table.to_values()).await?;
            tracing::debug!(store_id, attempt, rows = table.len(), "table written");
            return Ok(value);
        }
    }
}
