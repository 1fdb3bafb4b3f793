//! The boundary between the page store and table files.

use std::fmt;

use crate::buffer::{PageHandle, PageStore};
use crate::common::{PageIdentity, Result, TableId, TransactionId};
use crate::storage::page::Page;

/// Where a stored tuple lives: a page and a slot on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page: PageIdentity,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page: PageIdentity, slot: u16) -> Self {
        Self { page, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({}:{}#{})", self.page.table_id, self.page.page_no, self.slot)
    }
}

/// An opaque row image plus, once stored, its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    record_id: Option<RecordId>,
    data: Vec<u8>,
}

impl Tuple {
    /// A tuple not yet stored anywhere.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            record_id: None,
            data: data.into(),
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}

/// A table file as seen by the [`PageStore`].
///
/// Page reads and writes are page-granular and bypass the cache; the store
/// decides when they happen. Tuple mutations go the other way: the backend
/// fetches the pages it changes through the store (which takes the locks),
/// edits them through [`PageHandle::write`], and returns every page it
/// touched so the store can track them as dirty.
pub trait StorageBackend: Send + Sync {
    /// Table this backend stores.
    fn id(&self) -> TableId;

    /// Number of pages currently in the table file.
    fn num_pages(&self) -> Result<u32>;

    /// Read a page from the file.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page lies past the end of the file
    /// - `Error::Storage` on I/O failure
    fn read_page(&self, pid: PageIdentity) -> Result<Page>;

    /// Write a page to the file.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page lies past the end of the file
    /// - `Error::Storage` on I/O failure
    fn write_page(&self, pid: PageIdentity, page: &Page) -> Result<()>;

    /// Store `tuple` on behalf of `tid` and set its record id.
    ///
    /// May append a new, empty page to the file.
    fn insert_tuple(
        &self,
        store: &PageStore,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageHandle>>;

    /// Remove `tuple` on behalf of `tid`.
    fn delete_tuple(
        &self,
        store: &PageStore,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageHandle>>;
}
