use std::path::PathBuf;

use tempfile::TempDir;

use crate::{storage::storage_manager::StorageManager, types::error::Result};

/// A scratch database file inside its own temporary directory. The directory
/// and everything in it is removed on drop.
pub struct TempDatabase {
    pub path: PathBuf,
    pub storage_manager: Option<StorageManager>,
    _dir: TempDir,
}

impl TempDatabase {
    pub fn with_prefix(prefix: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .expect("failed to create temp dir");
        Self {
            path: dir.path().join(format!("{}.db", prefix)),
            storage_manager: None,
            _dir: dir,
        }
    }

    pub fn create_storage_manager(&mut self) -> Result<&mut StorageManager> {
        let sm = StorageManager::open(&self.path)?;
        Ok(self.storage_manager.insert(sm))
    }

    /// Close the open database (if any) and open the file again.
    pub fn reopen(&mut self) -> Result<&mut StorageManager> {
        if let Some(sm) = self.storage_manager.take() {
            sm.close()?;
        }
        self.create_storage_manager()
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        self.storage_manager = None;
    }
}
