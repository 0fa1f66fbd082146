use crate::types::{
    MAX_ROWS, PAGE_HEADER_SIZE, PAGE_SIZE, PageIndex, ROW_SIZE, error::DatabaseError, row::Row,
};

/*
 * Data Page Layout on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                  row_count (4 bytes, i32)                       │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  [row 0 (64)] [row 1 (64)] ... [row row_count-1 (64)]           │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                  unused tail (zero filled)                      │
 * └─────────────────────────────────────────────────────────────────┘
 * At most MAX_ROWS (63) rows, always packed from slot 0 without holes.
 */

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub row_count: usize,
    pub is_dirty: bool,
    pub data: Vec<u8>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self {
            row_count: 0,
            is_dirty: false,
            data: vec![0; PAGE_SIZE],
        }
    }

    fn slot_offset(slot: usize) -> usize {
        PAGE_HEADER_SIZE + slot * ROW_SIZE
    }

    /// Byte offset of `slot` relative to the start of the page.
    pub fn slot_position(slot: usize) -> u64 {
        Self::slot_offset(slot) as u64
    }

    pub fn is_full(&self) -> bool {
        self.row_count >= MAX_ROWS
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Serialize the page to its on-disk image
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = self.data.clone();
        buffer[..PAGE_HEADER_SIZE].copy_from_slice(&(self.row_count as i32).to_le_bytes());
        buffer
    }

    /// Deserialize a page image. `page_index` only feeds error messages.
    pub fn from_bytes(page_index: PageIndex, bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }

        let raw_count = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if raw_count < 0 || raw_count as usize > MAX_ROWS {
            return Err(DatabaseError::CorruptedPage {
                page_index,
                reason: format!("row_count {} outside 0..={}", raw_count, MAX_ROWS),
            });
        }
        let row_count = raw_count as usize;

        let page = Page {
            row_count,
            is_dirty: false, // Freshly loaded page is not dirty
            data: bytes.to_vec(),
        };

        // Every counted slot must hold a real row
        for slot in 0..row_count {
            if page.get_row(slot)?.is_empty_slot() {
                return Err(DatabaseError::CorruptedPage {
                    page_index,
                    reason: format!("slot {} is counted but holds no row", slot),
                });
            }
        }

        Ok(page)
    }

    pub fn get_row(&self, slot: usize) -> Result<Row, DatabaseError> {
        if slot >= self.row_count {
            return Err(DatabaseError::InvalidSlotIndex {
                index: slot,
                max: self.row_count,
            });
        }
        let start = Self::slot_offset(slot);
        Row::from_bytes(&self.data[start..start + ROW_SIZE])
    }

    pub fn push_row(&mut self, row: &Row) -> Result<usize, DatabaseError> {
        if self.is_full() {
            return Err(DatabaseError::CapacityExceeded {
                details: format!("page already holds {} rows", MAX_ROWS),
            });
        }
        let slot = self.row_count;
        let start = Self::slot_offset(slot);
        self.data[start..start + ROW_SIZE].copy_from_slice(&row.to_bytes());
        self.row_count += 1;
        self.is_dirty = true;
        Ok(slot)
    }

    pub fn set_row(&mut self, slot: usize, row: &Row) -> Result<(), DatabaseError> {
        if slot >= self.row_count {
            return Err(DatabaseError::InvalidSlotIndex {
                index: slot,
                max: self.row_count,
            });
        }
        let start = Self::slot_offset(slot);
        self.data[start..start + ROW_SIZE].copy_from_slice(&row.to_bytes());
        self.is_dirty = true;
        Ok(())
    }

    /// Remove the row at `slot`, shifting later rows left and zeroing the
    /// freed tail slot.
    pub fn delete_row(&mut self, slot: usize) -> Result<(), DatabaseError> {
        if slot >= self.row_count {
            return Err(DatabaseError::InvalidSlotIndex {
                index: slot,
                max: self.row_count,
            });
        }

        let start = Self::slot_offset(slot);
        let end = Self::slot_offset(self.row_count);
        self.data.copy_within(start + ROW_SIZE..end, start);
        self.data[end - ROW_SIZE..end].fill(0);

        self.row_count -= 1;
        self.is_dirty = true;
        Ok(())
    }
}
