use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
};

use log::{debug, warn};

use crate::{
    storage::DATA_START,
    types::{
        FileOffset, MAX_PAGES, MAX_ROWS, PAGE_SIZE, PageIndex, ROW_SIZE,
        error::{DatabaseError, Result},
        page::Page,
        row::Row,
    },
};

/// What happened to the page a row was removed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The page still exists at the same index.
    Compacted,
    /// The page became empty and was dropped; every later page moved down by
    /// one index.
    PageReleased,
}

/// In-memory mirror of the data region. Pages are numbered from 0 and page
/// `i` lives at `DATA_START + i * PAGE_SIZE`.
#[derive(Debug)]
pub struct PageStore {
    pages: Vec<Page>,
}

impl Default for PageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore {
    /// A store holding the single zeroed page every database starts with.
    pub fn new() -> Self {
        let mut first = Page::new();
        first.is_dirty = true;
        Self { pages: vec![first] }
    }

    /// Read every page image in the data region.
    pub fn load(file: &mut File) -> Result<Self> {
        let file_size = file.metadata()?.len();
        let data_size = file_size.saturating_sub(DATA_START);
        if data_size % PAGE_SIZE as u64 != 0 {
            warn!(
                "data region is {} bytes, ignoring trailing partial page",
                data_size
            );
        }

        let page_count = (data_size / PAGE_SIZE as u64) as usize;
        if page_count > MAX_PAGES {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!("file holds {} data pages, limit is {}", page_count, MAX_PAGES),
            });
        }
        if page_count == 0 {
            return Ok(Self::new());
        }

        let mut pages = Vec::with_capacity(page_count);
        let mut buffer = vec![0u8; PAGE_SIZE];
        for page_index in 0..page_count {
            file.seek(SeekFrom::Start(Self::page_offset(page_index)))?;
            file.read_exact(&mut buffer)?;
            pages.push(Page::from_bytes(page_index, &buffer)?);
        }
        debug!("loaded {} data pages", page_count);
        Ok(Self { pages })
    }

    pub fn page_offset(page_index: PageIndex) -> FileOffset {
        DATA_START + (page_index * PAGE_SIZE) as FileOffset
    }

    /// Absolute file address of a row slot.
    pub fn row_address(page_index: PageIndex, slot: usize) -> FileOffset {
        Self::page_offset(page_index) + Page::slot_position(slot)
    }

    /// Inverse of [`PageStore::row_address`]; `None` for addresses that do not
    /// fall on a slot boundary of the data region.
    pub fn locate(address: FileOffset) -> Option<(PageIndex, usize)> {
        let relative = address.checked_sub(DATA_START)?;
        let page_index = (relative / PAGE_SIZE as u64) as usize;
        let in_page = (relative % PAGE_SIZE as u64).checked_sub(Page::slot_position(0))?;
        if in_page % ROW_SIZE as u64 != 0 {
            return None;
        }
        let slot = (in_page / ROW_SIZE as u64) as usize;
        (slot < MAX_ROWS).then_some((page_index, slot))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn row_count(&self) -> usize {
        self.pages.iter().map(|page| page.row_count).sum()
    }

    pub fn has_dirty_pages(&self) -> bool {
        self.pages.iter().any(|page| page.is_dirty)
    }

    pub fn page(&self, page_index: PageIndex) -> Result<&Page> {
        let page_count = self.pages.len();
        self.pages.get(page_index).ok_or(DatabaseError::PageNotFound {
            page_index,
            page_count,
        })
    }

    fn page_mut(&mut self, page_index: PageIndex) -> Result<&mut Page> {
        let page_count = self.pages.len();
        self.pages
            .get_mut(page_index)
            .ok_or(DatabaseError::PageNotFound {
                page_index,
                page_count,
            })
    }

    pub fn allocate_page(&mut self) -> Result<PageIndex> {
        if self.pages.len() >= MAX_PAGES {
            return Err(DatabaseError::CapacityExceeded {
                details: format!("all {} data pages are in use", MAX_PAGES),
            });
        }
        let mut page = Page::new();
        page.is_dirty = true;
        self.pages.push(page);
        let page_index = self.pages.len() - 1;
        debug!("allocated data page {}", page_index);
        Ok(page_index)
    }

    pub fn read_row(&self, page_index: PageIndex, slot: usize) -> Result<Row> {
        self.page(page_index)?.get_row(slot)
    }

    /// Append `row` after the last occupied slot; returns the slot used.
    pub fn append_row(&mut self, page_index: PageIndex, row: &Row) -> Result<usize> {
        self.page_mut(page_index)?.push_row(row)
    }

    pub fn write_row(&mut self, page_index: PageIndex, slot: usize, row: &Row) -> Result<()> {
        self.page_mut(page_index)?.set_row(slot, row)
    }

    /// Remove the row at `slot`, closing the gap. A page left empty is dropped
    /// unless it is the only one.
    pub fn remove_row(&mut self, page_index: PageIndex, slot: usize) -> Result<RemoveOutcome> {
        let page = self.page_mut(page_index)?;
        page.delete_row(slot)?;
        let emptied = page.is_empty();

        if emptied && self.pages.len() > 1 {
            self.pages.remove(page_index);
            for moved in &mut self.pages[page_index..] {
                moved.is_dirty = true;
            }
            debug!(
                "released empty data page {}, {} pages remain",
                page_index,
                self.pages.len()
            );
            return Ok(RemoveOutcome::PageReleased);
        }
        Ok(RemoveOutcome::Compacted)
    }

    /// Write every dirty page whole, then cut the file after the last live page
    /// so released pages are gone on reopen. Returns the number of pages written.
    pub fn flush(&mut self, file: &mut File) -> Result<usize> {
        let mut written = 0;
        for (page_index, page) in self.pages.iter_mut().enumerate() {
            if !page.is_dirty {
                continue;
            }
            file.seek(SeekFrom::Start(Self::page_offset(page_index)))?;
            file.write_all(&page.to_bytes())?;
            page.is_dirty = false;
            written += 1;
        }

        let data_end = Self::page_offset(self.pages.len());
        if file.metadata()?.len() > data_end {
            file.set_len(data_end)?;
        }
        file.flush()?;

        if written > 0 {
            debug!("flushed {} dirty pages", written);
        }
        Ok(written)
    }
}
