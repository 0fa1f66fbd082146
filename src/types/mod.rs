pub mod error;
pub mod node;
pub mod page;
pub mod row;

// Common type aliases
pub type PageIndex = usize;
pub type RowKey = i32;
pub type FileOffset = u64;

// Fixed layout constants shared by pages and nodes
pub const PAGE_SIZE: usize = 4096;
pub const PAGE_HEADER_SIZE: usize = 4; // row_count (i32)

pub const ROW_ID_SIZE: usize = 4;
pub const ROW_NAME_SIZE: usize = 60; // NUL padded
pub const ROW_NAME_MAX_LEN: usize = ROW_NAME_SIZE - 1;
pub const ROW_SIZE: usize = ROW_ID_SIZE + ROW_NAME_SIZE;

pub const MAX_ROWS: usize = (PAGE_SIZE - PAGE_HEADER_SIZE) / ROW_SIZE; // 63
pub const MAX_PAGES: usize = 10;

pub const NODE_HEADER_SIZE: usize = 8; // num_keys (i32) + is_leaf (i32)
pub const NODE_MAX_KEYS: usize = 340;
pub const NODE_MAX_CHILDREN: usize = NODE_MAX_KEYS + 1;
pub const INDEX_ENTRY_SIZE: usize = 12; // id (i32) + address (i64)
