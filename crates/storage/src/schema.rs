use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS sheet_rows (
    store_id TEXT NOT NULL,
    row_index INTEGER NOT NULL CHECK (row_index >= 0),
    cells BLOB NOT NULL,
    PRIMARY KEY (store_id, row_index)
);

CREATE TABLE IF NOT EXISTS sheet_writes (
    store_id TEXT PRIMARY KEY,
    row_count INTEGER NOT NULL,
    write_count INTEGER NOT NULL DEFAULT 1,
    written_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
";
