use std::path::Path;
use std::sync::{Arc, Mutex};

use artisan_core::SheetValues;
use async_trait::async_trait;
use rusqlite::Connection;

use crate::error::StorageError;
use crate::traits::TableStore;

/// Sheets persisted in a local SQLite file, one row per sheet row.
/// Cells are MessagePack-encoded so ragged rows survive unchanged.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Number of whole-sheet writes recorded for `store_id`.
    pub fn write_count(&self, store_id: &str) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: Option<i64> = conn
            .query_row(
                "SELECT write_count FROM sheet_writes WHERE store_id = ?1",
                rusqlite::params![store_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e),
            })?;
        Ok(count.unwrap_or(0) as u64)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Background(e.to_string()))?
    }
}

fn read_rows(conn: &Connection, store_id: &str) -> Result<SheetValues, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT cells FROM sheet_rows WHERE store_id = ?1 ORDER BY row_index",
    )?;
    let blobs = stmt
        .query_map(rusqlite::params![store_id], |row| row.get::<_, Vec<u8>>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    blobs
        .iter()
        .map(|bytes| {
            rmp_serde::from_slice::<Vec<String>>(bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .collect()
}

fn replace_rows(
    conn: &mut Connection,
    store_id: &str,
    values: &[Vec<String>],
) -> Result<(), StorageError> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM sheet_rows WHERE store_id = ?1",
        rusqlite::params![store_id],
    )?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO sheet_rows (store_id, row_index, cells) VALUES (?1, ?2, ?3)",
        )?;
        for (index, row) in values.iter().enumerate() {
            let cells = rmp_serde::to_vec(row)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            insert.execute(rusqlite::params![store_id, index as i64, cells])?;
        }
    }
    tx.execute(
        "INSERT INTO sheet_writes (store_id, row_count) VALUES (?1, ?2)
         ON CONFLICT (store_id) DO UPDATE SET
            row_count = excluded.row_count,
            write_count = write_count + 1,
            written_at = excluded.written_at",
        rusqlite::params![store_id, values.len() as i64],
    )?;
    tx.commit()?;
    Ok(())
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn load_table(&self, store_id: &str) -> Result<SheetValues, StorageError> {
        let store_id = store_id.to_string();
        self.with_conn(move |conn| read_rows(conn, &store_id)).await
    }

    async fn store_table(&self, store_id: &str, values: &[Vec<String>]) -> Result<(), StorageError> {
        let store_id = store_id.to_string();
        let values = values.to_vec();
        self.with_conn(move |conn| replace_rows(conn, &store_id, &values))
            .await
    }
}
