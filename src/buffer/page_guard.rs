//! RAII guards for page access.
//!
//! These guards provide safe access to cached pages:
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access (auto-marks dirty)
//!
//! The guards latch the in-memory copy only. Transaction-level isolation
//! comes from the lock taken by `PageStore::get_page`.

use std::ops::Deref;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::CachedPage;
use crate::common::TransactionId;
use crate::storage::page::Page;

/// Guard for read-only page access.
///
/// # Example
/// ```ignore
/// let handle = store.get_page(tid, pid, AccessMode::ReadOnly)?;
/// let guard = handle.read();
/// let bytes = guard.data().as_slice();
/// ```
pub struct PageReadGuard<'a> {
    lock: RwLockReadGuard<'a, CachedPage>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(lock: RwLockReadGuard<'a, CachedPage>) -> Self {
        Self { lock }
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = CachedPage;

    #[inline]
    fn deref(&self) -> &CachedPage {
        &self.lock
    }
}

/// Guard for exclusive write access to a page.
///
/// The page is marked dirty, owned by the guard's transaction, when the
/// guard is dropped.
///
/// # Example
/// ```ignore
/// let handle = store.get_page(tid, pid, AccessMode::ReadWrite)?;
/// let mut guard = handle.write(tid);
/// guard.as_mut_slice()[0] = 0xFF;
/// // guard drops here, page marked dirty by tid
/// ```
pub struct PageWriteGuard<'a> {
    tid: TransactionId,
    lock: RwLockWriteGuard<'a, CachedPage>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(tid: TransactionId, lock: RwLockWriteGuard<'a, CachedPage>) -> Self {
        Self { tid, lock }
    }

    /// Transaction this write is made on behalf of.
    #[inline]
    pub fn tid(&self) -> TransactionId {
        self.tid
    }

    /// Mutable access to the page content.
    #[inline]
    pub fn page_mut(&mut self) -> &mut Page {
        self.lock.data_mut()
    }

    /// Mutable access to the raw page bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.lock.data_mut().as_mut_slice()
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = CachedPage;

    #[inline]
    fn deref(&self) -> &CachedPage {
        &self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        // Write guard: always dirty
        self.lock.mark_dirty(self.tid);
    }
}
