mod catalog;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageRead, StorageTx, StorageWrite};
