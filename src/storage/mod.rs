pub mod btree;
pub mod page_store;
pub mod storage_manager;

use crate::types::{FileOffset, PAGE_SIZE};

/*
 * File Layout
 * ┌──────────────┬──────────────────────────────┬──────────────────────────┐
 * │ root ptr (8) │ B-tree nodes, 4096 each      │ data pages, 4096 each    │
 * │ [0, 8)       │ [8, 20480)                   │ [20480, ...)             │
 * └──────────────┴──────────────────────────────┴──────────────────────────┘
 * The root pointer shifts the node grid by 8 bytes, so only 4 whole nodes
 * fit before DATA_START.
 */
const ROOT_POINTER_OFFSET: FileOffset = 0;
const ROOT_POINTER_SIZE: usize = 8;
pub const INDEX_START: FileOffset = ROOT_POINTER_SIZE as FileOffset;
pub const INDEX_PAGES: usize = 5;
pub const DATA_START: FileOffset = (INDEX_PAGES * PAGE_SIZE) as FileOffset;
