use thiserror::Error;

use crate::types::{FileOffset, PageIndex, RowKey};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key {id}: keys must be positive")]
    InvalidKey { id: RowKey },

    #[error("Duplicate key {id}")]
    DuplicateKey { id: RowKey },

    #[error("Key {id} not found")]
    NotFound { id: RowKey },

    #[error("Capacity exceeded: {details}")]
    CapacityExceeded { details: String },

    #[error("Index region full: no room for a node at offset {offset}")]
    IndexRegionFull { offset: FileOffset },

    #[error("Page {page_index} does not exist (page count: {page_count})")]
    PageNotFound {
        page_index: PageIndex,
        page_count: usize,
    },

    #[error("Invalid slot index {index} (max: {max})")]
    InvalidSlotIndex { index: usize, max: usize },

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Invalid page size: {expected} bytes, got {actual} bytes")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Corrupted page: page_index={page_index}, reason={reason}")]
    CorruptedPage { page_index: PageIndex, reason: String },

    #[error("Corrupted node: offset={offset}, reason={reason}")]
    CorruptedNode { offset: FileOffset, reason: String },

    #[error("Corrupted database: {reason}")]
    CorruptedDatabase { reason: String },

    #[error("Database is unusable after a failed write; reopen it to continue")]
    Poisoned,
}

impl DatabaseError {
    /// The file can no longer be trusted: an I/O call failed, or an earlier
    /// one poisoned the handle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DatabaseError::Io(_) | DatabaseError::Poisoned)
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
