pub mod adapter;
pub mod auth;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sheets;
pub mod sqlite;
pub mod traits;

pub use adapter::{Disposition, RowStore, WritePolicy};
pub use auth::{ServiceAccount, StaticToken, TokenSource};
pub use error::StorageError;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;
pub use sqlite::SqliteStore;
pub use traits::TableStore;
