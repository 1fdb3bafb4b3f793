//! Heap File - a table file of fixed-width tuples.
//!
//! The [`HeapFile`] handles:
//! - Page-granular reads and writes of the table file
//! - Appending empty pages when every page is full
//! - Tuple insertion and deletion through the page store

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::buffer::{PageHandle, PageStore};
use crate::common::config::PAGE_SIZE;
use crate::common::{AccessMode, Error, PageIdentity, Result, TableId, TransactionId};
use crate::storage::page::Page;
use crate::storage::{RecordId, StorageBackend, Tuple};

/// A table stored as a sequence of pages in one file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┘
/// ```
///
/// # Page Layout
/// ```text
/// ┌──────────────────┬────────┬────────┬─────┬────────────┐
/// │ occupancy bitmap │ slot 0 │ slot 1 │ ... │ slot S - 1 │
/// └──────────────────┴────────┴────────┴─────┴────────────┘
/// ```
/// Bit `i` (LSB first) of the bitmap is set when slot `i` holds a tuple.
/// `S` is the largest slot count for which bitmap and slots fit in a page.
pub struct HeapFile {
    table_id: TableId,
    tuple_size: usize,
    file: Mutex<File>,
}

impl HeapFile {
    /// Create a new, empty table file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    ///
    /// # Panics
    /// Panics if `tuple_size` is 0 or a single tuple does not fit in a page.
    pub fn create<P: AsRef<Path>>(path: P, table_id: TableId, tuple_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_file(file, table_id, tuple_size))
    }

    /// Open an existing table file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId, tuple_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::from_file(file, table_id, tuple_size))
    }

    /// Open an existing table file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        tuple_size: usize,
    ) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, table_id, tuple_size)
        } else {
            Self::create(path, table_id, tuple_size)
        }
    }

    fn from_file(file: File, table_id: TableId, tuple_size: usize) -> Self {
        assert!(
            tuple_size > 0 && tuple_size * 8 + 1 <= PAGE_SIZE * 8,
            "tuple_size must be in 1..{}",
            PAGE_SIZE
        );
        Self {
            table_id,
            tuple_size,
            file: Mutex::new(file),
        }
    }

    /// Width of every tuple in this table.
    #[inline]
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Number of tuple slots on each page.
    #[inline]
    pub fn slots_per_page(&self) -> usize {
        (PAGE_SIZE * 8) / (self.tuple_size * 8 + 1)
    }

    fn bitmap_len(&self) -> usize {
        self.slots_per_page().div_ceil(8)
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.bitmap_len() + slot * self.tuple_size
    }

    fn is_used(&self, page: &Page, slot: usize) -> bool {
        page.as_slice()[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_used(&self, page: &mut Page, slot: usize, used: bool) {
        let byte = &mut page.as_mut_slice()[slot / 8];
        if used {
            *byte |= 1 << (slot % 8);
        } else {
            *byte &= !(1 << (slot % 8));
        }
    }

    fn free_slot(&self, page: &Page) -> Option<usize> {
        (0..self.slots_per_page()).find(|&slot| !self.is_used(page, slot))
    }

    /// Number of empty slots on `page`.
    pub fn free_slots(&self, page: &Page) -> usize {
        (0..self.slots_per_page())
            .filter(|&slot| !self.is_used(page, slot))
            .count()
    }

    /// Decode every tuple stored on `page`, which lives at `pid`.
    pub fn tuples(&self, pid: PageIdentity, page: &Page) -> Vec<Tuple> {
        (0..self.slots_per_page())
            .filter(|&slot| self.is_used(page, slot))
            .map(|slot| {
                let offset = self.slot_offset(slot);
                let mut tuple = Tuple::new(&page.as_slice()[offset..offset + self.tuple_size]);
                tuple.set_record_id(Some(RecordId::new(pid, slot as u16)));
                tuple
            })
            .collect()
    }

    /// Append a zeroed page to the file and return its id.
    ///
    /// An empty page carries no transaction's data, so writing it directly
    /// keeps uncommitted tuples out of the file.
    fn append_empty_page(&self) -> Result<PageIdentity> {
        let mut file = self.file.lock();
        let page_no = Self::page_count(&file)?;

        let offset = (page_no as u64) * (PAGE_SIZE as u64);
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(Page::new().as_slice())?;
        file.sync_all()?;

        let pid = PageIdentity::new(self.table_id, page_no);
        tracing::debug!(page = %pid, "appended empty page");
        Ok(pid)
    }

    fn page_count(file: &File) -> Result<u32> {
        let len = file.metadata()?.len();
        Ok(len.div_ceil(PAGE_SIZE as u64) as u32)
    }

    fn write_into_free_slot(
        &self,
        handle: &PageHandle,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Option<RecordId> {
        let slot = self.free_slot(handle.read().data())?;

        let mut page = handle.write(tid);
        let offset = self.slot_offset(slot);
        page.page_mut().as_mut_slice()[offset..offset + self.tuple_size]
            .copy_from_slice(tuple.data());
        self.set_used(page.page_mut(), slot, true);

        let rid = RecordId::new(handle.id(), slot as u16);
        tuple.set_record_id(Some(rid));
        Some(rid)
    }
}

impl StorageBackend for HeapFile {
    fn id(&self) -> TableId {
        self.table_id
    }

    fn num_pages(&self) -> Result<u32> {
        Self::page_count(&self.file.lock())
    }

    fn read_page(&self, pid: PageIdentity) -> Result<Page> {
        let mut file = self.file.lock();
        if pid.page_no >= Self::page_count(&file)? {
            return Err(Error::PageNotFound(pid));
        }

        let offset = (pid.page_no as u64) * (PAGE_SIZE as u64);
        file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    fn write_page(&self, pid: PageIdentity, page: &Page) -> Result<()> {
        let mut file = self.file.lock();
        if pid.page_no >= Self::page_count(&file)? {
            return Err(Error::PageNotFound(pid));
        }

        let offset = (pid.page_no as u64) * (PAGE_SIZE as u64);
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.as_slice())?;
        file.sync_all()?;

        Ok(())
    }

    fn insert_tuple(
        &self,
        store: &PageStore,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageHandle>> {
        if tuple.data().len() != self.tuple_size {
            return Err(Error::TupleSize {
                expected: self.tuple_size,
                actual: tuple.data().len(),
            });
        }

        for page_no in 0..self.num_pages()? {
            let pid = PageIdentity::new(self.table_id, page_no);
            let handle = store.get_page(tid, pid, AccessMode::ReadOnly)?;
            if self.free_slot(handle.read().data()).is_none() {
                continue;
            }

            // Upgrade; the handle above pins the page, so this is the same copy
            let handle = store.get_page(tid, pid, AccessMode::ReadWrite)?;
            if self.write_into_free_slot(&handle, tid, tuple).is_some() {
                return Ok(vec![handle]);
            }
        }

        let pid = self.append_empty_page()?;
        let handle = store.get_page(tid, pid, AccessMode::ReadWrite)?;
        match self.write_into_free_slot(&handle, tid, tuple) {
            Some(_) => Ok(vec![handle]),
            // Another transaction filled the page between append and lock
            None => self.insert_tuple(store, tid, tuple),
        }
    }

    fn delete_tuple(
        &self,
        store: &PageStore,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageHandle>> {
        let rid = tuple.record_id().ok_or(Error::TupleNotStored)?;
        let slot = rid.slot as usize;
        if rid.page.table_id != self.table_id || slot >= self.slots_per_page() {
            return Err(Error::SlotEmpty(rid));
        }

        let handle = store.get_page(tid, rid.page, AccessMode::ReadWrite)?;
        if !self.is_used(handle.read().data(), slot) {
            return Err(Error::SlotEmpty(rid));
        }

        {
            let mut page = handle.write(tid);
            self.set_used(page.page_mut(), slot, false);
        }

        Ok(vec![handle])
    }
}
