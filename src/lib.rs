pub mod executor;
pub mod storage;
pub mod types;
pub mod utils;

pub use storage::storage_manager::StorageManager as Database;
