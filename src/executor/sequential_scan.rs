use crate::{
    executor::scan::Scanner,
    storage::page_store::PageStore,
    types::{PageIndex, error::DatabaseError, row::Row},
};

/// Walks the in-memory pages in page order, then slot order. Never touches
/// the index.
pub struct SequentialScanner<'a> {
    store: &'a PageStore,
    current_page: PageIndex,
    current_slot_index: usize,
    is_exhausted: bool,
}

impl<'a> SequentialScanner<'a> {
    pub fn new(store: &'a PageStore) -> Self {
        Self {
            store,
            current_page: 0,
            current_slot_index: 0,
            is_exhausted: false,
        }
    }
}

impl Scanner for SequentialScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>, DatabaseError> {
        if self.is_exhausted {
            return Ok(None);
        }
        loop {
            let Some(page) = self.store.pages().get(self.current_page) else {
                self.is_exhausted = true;
                return Ok(None);
            };
            if self.current_slot_index >= page.row_count {
                self.current_page += 1;
                self.current_slot_index = 0;
                continue;
            }
            let row = page.get_row(self.current_slot_index)?;
            self.current_slot_index += 1;
            // Placeholder slots never surface
            if row.is_empty_slot() {
                continue;
            }
            return Ok(Some(row));
        }
    }

    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Row>, DatabaseError> {
        let mut rows = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            match self.scan()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    fn reset(&mut self) -> Result<(), DatabaseError> {
        self.current_page = 0;
        self.current_slot_index = 0;
        self.is_exhausted = false;
        Ok(())
    }
}
