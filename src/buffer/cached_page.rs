//! Cached Page - a page resident in the page store.
//!
//! A [`CachedPage`] holds a [`Page`] plus the metadata transactions need:
//! - Which page it is
//! - Which transaction dirtied it, if any
//! - The before-image abort restores

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::{PageReadGuard, PageWriteGuard};
use crate::common::{PageIdentity, TransactionId};
use crate::storage::page::Page;

/// In-memory copy of one page.
///
/// A clean page's content equals its before-image. Content can only be
/// changed through a [`PageWriteGuard`], which marks the page dirty, so the
/// before-image always holds the last committed content.
pub struct CachedPage {
    id: PageIdentity,
    data: Box<Page>,
    before_image: Box<Page>,
    dirty: Option<TransactionId>,
    /// The backend already holds `data` although it is not committed.
    uncommitted_on_disk: bool,
}

impl CachedPage {
    /// A clean page whose before-image is `page` itself.
    pub(crate) fn new(id: PageIdentity, page: Page) -> Self {
        let mut before_image = Box::new(Page::new());
        before_image.copy_from(&page);
        Self {
            id,
            data: Box::new(page),
            before_image,
            dirty: None,
            uncommitted_on_disk: false,
        }
    }

    #[inline]
    pub fn id(&self) -> PageIdentity {
        self.id
    }

    /// Current content, including uncommitted changes.
    #[inline]
    pub fn data(&self) -> &Page {
        &self.data
    }

    /// Last committed content.
    #[inline]
    pub fn before_image(&self) -> &Page {
        &self.before_image
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// The transaction whose changes are not yet written, if any.
    #[inline]
    pub fn dirty_owner(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Whether a commit that failed part way left this page's uncommitted
    /// content in the backend. Abort has to write the before-image back.
    #[inline]
    pub fn is_uncommitted_on_disk(&self) -> bool {
        self.uncommitted_on_disk
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut Page {
        &mut self.data
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirty = Some(tid);
    }

    #[inline]
    pub(crate) fn mark_uncommitted_on_disk(&mut self) {
        self.uncommitted_on_disk = true;
    }

    /// The content is now durable: clear the dirty flag and make the
    /// content the new before-image.
    pub(crate) fn mark_committed(&mut self) {
        self.before_image.copy_from(&self.data);
        self.dirty = None;
        self.uncommitted_on_disk = false;
    }

    /// Throw away uncommitted changes.
    pub(crate) fn restore_before_image(&mut self) {
        self.data.copy_from(&self.before_image);
        self.dirty = None;
        self.uncommitted_on_disk = false;
    }
}

/// Shared handle on a cached page, as returned by
/// [`PageStore::get_page`](crate::buffer::PageStore::get_page).
///
/// A live handle pins its page: the store never evicts a page while any
/// handle to it exists, so a handle always refers to the resident copy and
/// writes through it are seen by commit and abort. Drop handles once done
/// with them, or the cache can run out of evictable pages.
#[derive(Clone)]
pub struct PageHandle {
    id: PageIdentity,
    page: Arc<RwLock<CachedPage>>,
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PageHandle {
    pub(crate) fn new(page: CachedPage) -> Self {
        Self {
            id: page.id(),
            page: Arc::new(RwLock::new(page)),
        }
    }

    #[inline]
    pub fn id(&self) -> PageIdentity {
        self.id
    }

    /// Shared access to the page.
    pub fn read(&self) -> PageReadGuard<'_> {
        PageReadGuard::new(self.page.read())
    }

    /// Exclusive access to the page on behalf of `tid`.
    ///
    /// The page is marked dirty with owner `tid` when the guard drops. The
    /// caller must hold `tid`'s `ReadWrite` lock on the page.
    pub fn write(&self, tid: TransactionId) -> PageWriteGuard<'_> {
        PageWriteGuard::new(tid, self.page.write())
    }

    /// Whether both handles refer to the same cached copy.
    pub fn ptr_eq(&self, other: &PageHandle) -> bool {
        Arc::ptr_eq(&self.page, &other.page)
    }

    pub(crate) fn lock(&self) -> RwLockReadGuard<'_, CachedPage> {
        self.page.read()
    }

    pub(crate) fn lock_mut(&self) -> RwLockWriteGuard<'_, CachedPage> {
        self.page.write()
    }

    /// Clean and not being written right now.
    pub(crate) fn is_clean_now(&self) -> bool {
        self.page.try_read().is_some_and(|page| !page.is_dirty())
    }

    /// Whether a handle other than this one refers to the same page.
    ///
    /// Only meaningful on the store's own handle, while the cache mutex is
    /// held: that is the only place new handles are cloned from.
    pub(crate) fn is_pinned(&self) -> bool {
        Arc::strong_count(&self.page) > 1
    }
}
