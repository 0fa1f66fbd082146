use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, error, info};

use crate::{
    executor::{scan::ScanIterator, sequential_scan::SequentialScanner},
    storage::{
        btree::BTree,
        page_store::{PageStore, RemoveOutcome},
    },
    types::{
        FileOffset, PageIndex, ROW_SIZE, RowKey,
        error::{DatabaseError, Result},
        row::Row,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub page_count: usize,
    pub row_count: usize,
    pub index_height: usize,
    pub index_nodes: usize,
    pub root_offset: FileOffset,
}

/// The database: owns the file, the in-memory data pages and the index.
///
/// Every mutating call writes the affected pages, nodes and the root pointer
/// before it returns, so nothing lives only in memory between calls. An I/O
/// failure while writing poisons the handle: every later call fails with
/// [`DatabaseError::Poisoned`] and the file must be reopened.
pub struct StorageManager {
    path: PathBuf,
    file: File,
    pages: PageStore,
    index: BTree,
    poisoned: bool,
}

impl StorageManager {
    /// Open the database at `path`, creating and initializing it when the
    /// file is missing or empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let storage_manager = if file.metadata()?.len() == 0 {
            info!("Creating new database at path: {}", path.display());
            let index = BTree::create(file.try_clone()?)?;
            let mut pages = PageStore::new();
            pages.flush(&mut file)?;
            file.sync_all()?;
            Self {
                path: path.to_path_buf(),
                file,
                pages,
                index,
                poisoned: false,
            }
        } else {
            info!("Opening existing database at path: {}", path.display());
            let index = BTree::open(file.try_clone()?)?;
            let pages = PageStore::load(&mut file)?;
            Self {
                path: path.to_path_buf(),
                file,
                pages,
                index,
                poisoned: false,
            }
        };

        debug!(
            "database ready: {} pages, {} rows, root at {}",
            storage_manager.pages.page_count(),
            storage_manager.pages.row_count(),
            storage_manager.index.root_offset
        );
        Ok(storage_manager)
    }

    fn check_key(id: RowKey) -> Result<()> {
        if id <= 0 {
            return Err(DatabaseError::InvalidKey { id });
        }
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(DatabaseError::Poisoned);
        }
        Ok(())
    }

    /// Run a mutating operation. A fatal error leaves the file in an unknown
    /// state, so the handle refuses all further work.
    fn mutate<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.ensure_usable()?;
        let result = op(self);
        if let Err(err) = &result {
            if err.is_fatal() {
                error!(
                    "write to {} failed, refusing further operations: {}",
                    self.path.display(),
                    err
                );
                self.poisoned = true;
            }
        }
        result
    }

    fn persist(&mut self) -> Result<()> {
        self.pages.flush(&mut self.file)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn resolve(&mut self, id: RowKey) -> Result<FileOffset> {
        self.index
            .search(id)?
            .ok_or(DatabaseError::NotFound { id })
    }

    /// Map an indexed address back to its page slot, checking that the slot
    /// really holds `id`.
    fn slot_of(&self, id: RowKey, address: FileOffset) -> Result<(PageIndex, usize)> {
        let (page_index, slot) =
            PageStore::locate(address).ok_or_else(|| DatabaseError::CorruptedDatabase {
                reason: format!("key {} indexed at non-row address {}", id, address),
            })?;
        let stored = self.pages.read_row(page_index, slot)?;
        if stored.id != id {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!(
                    "key {} indexed at address {} which holds key {}",
                    id, address, stored.id
                ),
            });
        }
        Ok((page_index, slot))
    }

    pub fn insert(&mut self, id: RowKey, name: impl AsRef<[u8]>) -> Result<()> {
        let row = Row::new(id, name);
        self.mutate(|db| db.insert_row(row))
    }

    fn insert_row(&mut self, row: Row) -> Result<()> {
        let id = row.id;
        Self::check_key(id)?;
        if self.index.search(id)?.is_some() {
            return Err(DatabaseError::DuplicateKey { id });
        }

        let mut page_index = self.pages.page_count() - 1;
        if self.pages.page(page_index)?.is_full() {
            page_index = self.pages.allocate_page()?;
        }
        let slot = self.pages.append_row(page_index, &row)?;
        let address = PageStore::row_address(page_index, slot);

        // The row is on disk before any index entry points at it. Unstaging
        // releases a page allocated for the row again.
        if let Err(err) = self.persist() {
            self.pages.remove_row(page_index, slot)?;
            return Err(err);
        }
        if let Err(err) = self.index.insert(id, address) {
            self.pages.remove_row(page_index, slot)?;
            self.persist()?;
            return Err(err);
        }

        self.file.sync_data()?;
        debug!("inserted key {} at address {}", id, address);
        Ok(())
    }

    /// Read one row straight from the file at its indexed address.
    pub fn select_one(&mut self, id: RowKey) -> Result<Row> {
        self.ensure_usable()?;
        Self::check_key(id)?;
        let address = self.resolve(id)?;

        let mut buffer = [0u8; ROW_SIZE];
        self.file.seek(SeekFrom::Start(address))?;
        self.file.read_exact(&mut buffer)?;
        let row = Row::from_bytes(&buffer)?;
        if row.id != id {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!("key {} indexed at address {} which holds key {}", id, address, row.id),
            });
        }
        Ok(row)
    }

    /// Every row, in page order then slot order.
    pub fn select_all(&self) -> Result<Vec<Row>> {
        self.ensure_usable()?;
        ScanIterator::new(SequentialScanner::new(&self.pages)).collect()
    }

    pub fn update(&mut self, id: RowKey, name: impl AsRef<[u8]>) -> Result<()> {
        let row = Row::new(id, name);
        self.mutate(|db| db.update_row(row))
    }

    fn update_row(&mut self, row: Row) -> Result<()> {
        let id = row.id;
        Self::check_key(id)?;
        let address = self.resolve(id)?;
        let (page_index, slot) = self.slot_of(id, address)?;

        self.file.seek(SeekFrom::Start(address))?;
        self.file.write_all(&row.to_bytes())?;
        self.pages.write_row(page_index, slot, &row)?;

        self.persist()?;
        debug!("updated key {} at address {}", id, address);
        Ok(())
    }

    pub fn delete(&mut self, id: RowKey) -> Result<()> {
        self.mutate(|db| db.delete_row(id))
    }

    fn delete_row(&mut self, id: RowKey) -> Result<()> {
        Self::check_key(id)?;
        let address = self.resolve(id)?;
        let (page_index, slot) = self.slot_of(id, address)?;

        if !self.index.delete(id)? {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!("key {} is found by search but not by delete", id),
            });
        }
        match self.pages.remove_row(page_index, slot)? {
            RemoveOutcome::Compacted => self.repoint_rows(page_index, slot)?,
            RemoveOutcome::PageReleased => {
                for moved_page in page_index..self.pages.page_count() {
                    self.repoint_rows(moved_page, 0)?;
                }
            }
        }

        self.persist()?;
        debug!("deleted key {} from address {}", id, address);
        Ok(())
    }

    /// Re-point the index at rows of `page_index` from `from_slot` on, after
    /// compaction moved them.
    fn repoint_rows(&mut self, page_index: PageIndex, from_slot: usize) -> Result<()> {
        let page = self.pages.page(page_index)?;
        let moved = (from_slot..page.row_count)
            .map(|slot| -> Result<(RowKey, FileOffset)> {
                Ok((page.get_row(slot)?.id, PageStore::row_address(page_index, slot)))
            })
            .collect::<Result<Vec<_>>>()?;

        for (id, address) in moved {
            if !self.index.update(id, address)? {
                return Err(DatabaseError::CorruptedDatabase {
                    reason: format!("stored key {} has no index entry", id),
                });
            }
        }
        Ok(())
    }

    pub fn root_offset(&self) -> FileOffset {
        self.index.root_offset
    }

    pub fn page_count(&self) -> usize {
        self.pages.page_count()
    }

    pub fn row_count(&self) -> usize {
        self.pages.row_count()
    }

    /// Check that index and pages agree in both directions: every entry points
    /// at a slot holding its key, and every stored row is indexed at its slot.
    pub fn verify(&mut self) -> Result<()> {
        self.ensure_usable()?;
        let entries = self.index.entries()?;
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].id >= pair[1].id) {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!("index keys out of order: {} then {}", pair[0].id, pair[1].id),
            });
        }

        let mut indexed = HashMap::with_capacity(entries.len());
        for entry in &entries {
            self.slot_of(entry.id, entry.address)?;
            indexed.insert(entry.id, entry.address);
        }

        for (page_index, page) in self.pages.pages().iter().enumerate() {
            for slot in 0..page.row_count {
                let id = page.get_row(slot)?.id;
                let address = PageStore::row_address(page_index, slot);
                if indexed.get(&id) != Some(&address) {
                    return Err(DatabaseError::CorruptedDatabase {
                        reason: format!("row {} at address {} is not indexed there", id, address),
                    });
                }
            }
        }

        if entries.len() != self.pages.row_count() {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!(
                    "index holds {} entries but pages hold {} rows",
                    entries.len(),
                    self.pages.row_count()
                ),
            });
        }
        Ok(())
    }

    pub fn stats(&mut self) -> Result<DatabaseStats> {
        self.ensure_usable()?;
        Ok(DatabaseStats {
            page_count: self.pages.page_count(),
            row_count: self.pages.row_count(),
            index_height: self.index.height()?,
            index_nodes: self.index.node_count()?,
            root_offset: self.index.root_offset,
        })
    }

    /// Flush anything still dirty and release the file. A poisoned handle is
    /// dropped without writing.
    pub fn close(mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.pages.has_dirty_pages() {
            self.persist()?;
        }
        info!("Closed database at path: {}", self.path.display());
        Ok(())
    }
}
