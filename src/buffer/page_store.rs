//! Page Store - the transactional page cache.
//!
//! The [`PageStore`] provides:
//! - Page caching between table files and query operators
//! - Locking every page it hands out on behalf of a transaction
//! - NO-STEAL replacement: dirty pages never leave the cache
//! - Commit (log, force, write) and abort (restore before-images)

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{CachedPage, PageHandle, PageStoreStats};
use crate::common::{
    AccessMode, Error, PageIdentity, PageStoreConfig, Result, TableId, TransactionId,
};
use crate::concurrency::LockManager;
use crate::recovery::RecoveryLog;
use crate::storage::{Catalog, Tuple};

/// Resident pages plus their recency order.
struct PageCache {
    pages: HashMap<PageIdentity, PageHandle>,
    replacer: LruReplacer,
}

/// Caches pages for transactions and enforces their isolation.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                         PageStore                           │
/// │  ┌──────────────────────────┐   ┌───────────────────────┐   │
/// │  │ cache: Mutex<PageCache>  │   │ locks: LockManager    │   │
/// │  │  PageIdentity → Handle   │   │  per-page S/X locks   │   │
/// │  │  LruReplacer             │   │  wait-for graph       │   │
/// │  └──────────────────────────┘   └───────────────────────┘   │
/// │  ┌──────────────────────────┐   ┌───────────────────────┐   │
/// │  │ catalog: Arc<Catalog>    │   │ log: RecoveryLog      │   │
/// │  │  table → StorageBackend  │   │  before/after images  │   │
/// │  └──────────────────────────┘   └───────────────────────┘   │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - Lock acquisition happens before the cache mutex is taken, so a blocked
///   transaction never stalls the cache.
/// - Lookup, insertion, and eviction each run inside one critical section
///   on `cache`.
/// - Commit, abort, and flushes collect their handles under the mutex and
///   release it before latching pages or doing I/O. The pages stay
///   resident because the collected handles pin them.
/// - The cache mutex is taken before a page latch only with `try_read`,
///   which never blocks.
///
/// # Page Lifecycle
/// ```text
/// Absent ──fetch──▶ Clean ──write──▶ Dirty(tid) ──commit/abort──▶ Clean ──evict/discard──▶ Absent
/// ```
/// A page is only evicted while clean, not exclusively locked, and not
/// pinned by a live [`PageHandle`].
///
/// # Usage
/// ```ignore
/// let store = PageStore::new(PageStoreConfig::default(), catalog, log);
/// let tid = TransactionId::new();
///
/// let handle = store.get_page(tid, pid, AccessMode::ReadWrite)?;
/// handle.write(tid).as_mut_slice()[0] = 0xAB;
///
/// store.commit(tid)?;
/// ```
pub struct PageStore {
    cache: Mutex<PageCache>,
    locks: LockManager,
    catalog: Arc<Catalog>,
    log: Arc<dyn RecoveryLog>,
    stats: PageStoreStats,
    capacity: usize,
}

impl PageStore {
    /// Create a page store over the tables in `catalog`.
    ///
    /// # Panics
    /// Panics if `config.capacity` is 0.
    pub fn new(config: PageStoreConfig, catalog: Arc<Catalog>, log: Arc<dyn RecoveryLog>) -> Self {
        assert!(config.capacity > 0, "capacity must be > 0");

        Self {
            cache: Mutex::new(PageCache {
                pages: HashMap::with_capacity(config.capacity),
                replacer: LruReplacer::new(),
            }),
            locks: LockManager::new(),
            catalog,
            log,
            stats: PageStoreStats::new(),
            capacity: config.capacity,
        }
    }

    // ========================================================================
    // Public API: Page access
    // ========================================================================

    /// Lock `pid` for `tid` in `mode` and return the cached page.
    ///
    /// Blocks while another transaction holds a conflicting lock. On a miss
    /// the page is read from its table's backend, evicting the least
    /// recently used clean page if the cache is full.
    ///
    /// # Errors
    /// - `Error::DeadlockDetected` if waiting for the lock would deadlock
    /// - `Error::CapacityExhausted` if every cached page is dirty, locked
    ///   exclusively, or pinned by a handle
    /// - `Error::NoSuchTable` / `Error::PageNotFound` / `Error::Storage`
    ///   from the backend lookup and read
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageIdentity,
        mode: AccessMode,
    ) -> Result<PageHandle> {
        self.locks.acquire(tid, pid, mode)?;

        let mut cache = self.cache.lock();
        if let Some(handle) = cache.pages.get(&pid).cloned() {
            cache.replacer.record_access(pid);
            PageStoreStats::bump(&self.stats.cache_hits);
            tracing::trace!(%tid, page = %pid, "cache hit");
            return Ok(handle);
        }

        PageStoreStats::bump(&self.stats.cache_misses);

        let backend = self.catalog.backend_for(pid.table_id)?;
        let page = backend.read_page(pid)?;
        PageStoreStats::bump(&self.stats.pages_read);

        self.make_room(&mut cache)?;

        let handle = PageHandle::new(CachedPage::new(pid, page));
        cache.pages.insert(pid, handle.clone());
        cache.replacer.record_access(pid);
        tracing::debug!(%tid, page = %pid, "page loaded");

        Ok(handle)
    }

    /// Release `tid`'s lock on a single page before the transaction ends.
    ///
    /// Breaks two-phase locking; only safe for pages `tid` did not change.
    pub fn release_page(&self, tid: TransactionId, pid: PageIdentity) {
        self.locks.release(tid, pid);
    }

    /// Whether `tid` holds a lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageIdentity) -> bool {
        self.locks.holds(tid, pid)
    }

    // ========================================================================
    // Public API: Tuple mutation
    // ========================================================================

    /// Insert `tuple` into `table_id` on behalf of `tid`.
    ///
    /// Every page the backend changed is marked dirty by `tid` and kept in
    /// the cache, replacing any other cached copy. On success the tuple
    /// carries its new record id.
    ///
    /// # Errors
    /// - `Error::CapacityExhausted` if a changed page is not resident and
    ///   no clean page can make room for it
    /// - anything `get_page` or the backend reports
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let backend = self.catalog.backend_for(table_id)?;
        let pages = backend.insert_tuple(self, tid, tuple)?;
        self.install_dirty(tid, pages)
    }

    /// Delete `tuple`, located by its record id, on behalf of `tid`.
    ///
    /// # Errors
    /// - `Error::TupleNotStored` if the tuple has no record id
    /// - as for [`insert_tuple`](Self::insert_tuple)
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(Error::TupleNotStored)?;
        let backend = self.catalog.backend_for(rid.page.table_id)?;
        let pages = backend.delete_tuple(self, tid, tuple)?;
        self.install_dirty(tid, pages)
    }

    // ========================================================================
    // Public API: Transaction completion
    // ========================================================================

    /// Make `tid`'s changes durable and release its locks.
    ///
    /// Runs in three steps over the cached pages `tid` holds and dirtied:
    /// 1. log the before/after images of every page, then force the log once
    /// 2. write every page to its backend
    /// 3. mark every page clean, with its content as the new before-image
    ///
    /// Only pages `tid` changed reach the log and the backend: held pages
    /// that are clean are skipped. Committing a transaction with nothing
    /// dirty only releases locks.
    ///
    /// # Errors
    /// Log or backend failures are returned as-is. Every page stays dirty
    /// with its old before-image and every lock stays held, so the caller
    /// can [`abort`](Self::abort). Pages whose write already reached the
    /// backend are written back by that abort.
    pub fn commit(&self, tid: TransactionId) -> Result<()> {
        let held = self.held_pages_sorted(tid);
        let dirty = self.dirty_pages_of(tid, &held);

        if !dirty.is_empty() {
            for handle in &dirty {
                let page = handle.lock();
                self.log
                    .log_write(tid, page.id(), page.before_image(), page.data())?;
            }
            self.log.force()?;
            PageStoreStats::bump(&self.stats.log_forces);

            for handle in &dirty {
                let mut page = handle.lock_mut();
                let pid = page.id();
                self.catalog
                    .backend_for(pid.table_id)?
                    .write_page(pid, page.data())?;
                page.mark_uncommitted_on_disk();
                PageStoreStats::bump(&self.stats.pages_written);
            }

            for handle in &dirty {
                handle.lock_mut().mark_committed();
            }
        }

        self.locks.release_all(tid);
        PageStoreStats::bump(&self.stats.commits);
        tracing::debug!(%tid, pages = dirty.len(), "transaction committed");
        Ok(())
    }

    /// Undo `tid`'s uncommitted changes and release its locks.
    ///
    /// Every cached page `tid` holds and dirtied gets its before-image back.
    /// A page a failed commit already wrote is also restored in its backend.
    ///
    /// # Errors
    /// Backend failures while writing a before-image back are returned
    /// as-is, with every lock still held; calling `abort` again retries the
    /// pages not yet restored.
    pub fn abort(&self, tid: TransactionId) -> Result<()> {
        let held = self.held_pages_sorted(tid);
        let dirty = self.dirty_pages_of(tid, &held);

        for handle in &dirty {
            let mut page = handle.lock_mut();
            let pid = page.id();

            if page.is_uncommitted_on_disk() {
                self.catalog
                    .backend_for(pid.table_id)?
                    .write_page(pid, page.before_image())?;
                PageStoreStats::bump(&self.stats.pages_written);
                tracing::debug!(%tid, page = %pid, "undid partial commit in backend");
            }

            page.restore_before_image();
            tracing::debug!(%tid, page = %pid, "restored before-image");
        }

        self.locks.release_all(tid);
        PageStoreStats::bump(&self.stats.aborts);
        tracing::debug!(%tid, pages = dirty.len(), "transaction aborted");
        Ok(())
    }

    /// Commit (`commit == true`) or abort `tid`.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        if commit {
            self.commit(tid)
        } else {
            self.abort(tid)
        }
    }

    // ========================================================================
    // Public API: Cache maintenance
    // ========================================================================

    /// Drop a page from the cache without writing it.
    ///
    /// Used by recovery to forget pages it rolled back on disk.
    pub fn discard(&self, pid: PageIdentity) {
        let mut cache = self.cache.lock();
        if cache.pages.remove(&pid).is_some() {
            cache.replacer.remove(pid);
            tracing::debug!(page = %pid, "page discarded");
        }
    }

    /// Write a single page if it is dirty.
    ///
    /// Uncommitted changes reach the backend this way; the page's
    /// before-image moves forward with them.
    pub fn flush_page(&self, pid: PageIdentity) -> Result<()> {
        let handle = self.cache.lock().pages.get(&pid).cloned();
        match handle {
            Some(handle) => self.write_back(&handle),
            None => Ok(()),
        }
    }

    /// Write every dirty page `tid` holds a lock on, keeping the locks.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let held = self.held_pages_sorted(tid);
        for handle in self.resident(&held) {
            self.write_back(&handle)?;
        }
        Ok(())
    }

    /// Write every dirty page in the cache.
    ///
    /// For shutdown and tests. Called while transactions are running it
    /// writes their uncommitted changes, which abort can then no longer undo.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut pids: Vec<_> = self.cache.lock().pages.keys().copied().collect();
        pids.sort_unstable();

        for handle in self.resident(&pids) {
            self.write_back(&handle)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get page store statistics.
    pub fn stats(&self) -> &PageStoreStats {
        &self.stats
    }

    /// The lock manager guarding this store's pages.
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// The catalog pages are fetched through.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Maximum number of resident pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident pages.
    pub fn num_pages(&self) -> usize {
        self.cache.lock().pages.len()
    }

    /// Whether `pid` is resident.
    pub fn is_cached(&self, pid: PageIdentity) -> bool {
        self.cache.lock().pages.contains_key(&pid)
    }

    /// Whether `pid` is resident and dirty.
    pub fn is_dirty(&self, pid: PageIdentity) -> bool {
        self.dirty_owner(pid).is_some()
    }

    /// The transaction that dirtied `pid`, if it is resident and dirty.
    pub fn dirty_owner(&self, pid: PageIdentity) -> Option<TransactionId> {
        let handle = self.cache.lock().pages.get(&pid).cloned()?;
        let owner = handle.lock().dirty_owner();
        owner
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn held_pages_sorted(&self, tid: TransactionId) -> Vec<PageIdentity> {
        let mut held: Vec<_> = self.locks.held_pages(tid).into_iter().collect();
        held.sort_unstable();
        held
    }

    /// Handles on the resident pages among `pids`, in the same order.
    fn resident(&self, pids: &[PageIdentity]) -> Vec<PageHandle> {
        let cache = self.cache.lock();
        pids.iter()
            .filter_map(|pid| cache.pages.get(pid).cloned())
            .collect()
    }

    /// Handles on the resident pages among `held` that `tid` dirtied.
    fn dirty_pages_of(&self, tid: TransactionId, held: &[PageIdentity]) -> Vec<PageHandle> {
        self.resident(held)
            .into_iter()
            .filter(|handle| handle.lock().dirty_owner() == Some(tid))
            .collect()
    }

    /// Evict least recently used pages until one more fits.
    fn make_room(&self, cache: &mut PageCache) -> Result<()> {
        let PageCache { pages, replacer } = cache;

        while pages.len() >= self.capacity {
            let locks = &self.locks;
            let victim = replacer.evict(|pid| {
                pages
                    .get(&pid)
                    .is_some_and(|handle| !handle.is_pinned() && handle.is_clean_now())
                    && !locks.is_write_locked(pid)
            });

            match victim {
                Some(pid) => {
                    pages.remove(&pid);
                    PageStoreStats::bump(&self.stats.evictions);
                    tracing::debug!(page = %pid, "evicted page");
                }
                None => {
                    tracing::warn!(capacity = self.capacity, "no clean page to evict");
                    return Err(Error::CapacityExhausted {
                        capacity: self.capacity,
                    });
                }
            }
        }

        Ok(())
    }

    /// Mark pages changed by a tuple operation dirty and make them resident.
    fn install_dirty(&self, tid: TransactionId, pages: Vec<PageHandle>) -> Result<()> {
        let mut cache = self.cache.lock();

        for handle in pages {
            let pid = handle.id();
            handle.lock_mut().mark_dirty(tid);

            let resident = cache.pages.get(&pid).map(|cached| cached.ptr_eq(&handle));
            match resident {
                Some(true) => {}
                Some(false) => {
                    cache.pages.insert(pid, handle);
                }
                None => {
                    self.make_room(&mut cache)?;
                    cache.pages.insert(pid, handle);
                }
            }
            cache.replacer.record_access(pid);
        }

        Ok(())
    }

    /// Log, force, and write one dirty page, then mark it clean.
    ///
    /// Clean pages are skipped.
    fn write_back(&self, handle: &PageHandle) -> Result<()> {
        let mut page = handle.lock_mut();
        let Some(owner) = page.dirty_owner() else {
            return Ok(());
        };
        let pid = page.id();

        self.log.log_write(owner, pid, page.before_image(), page.data())?;
        self.log.force()?;
        PageStoreStats::bump(&self.stats.log_forces);

        self.catalog
            .backend_for(pid.table_id)?
            .write_page(pid, page.data())?;
        PageStoreStats::bump(&self.stats.pages_written);

        page.mark_committed();
        tracing::debug!(tid = %owner, page = %pid, "flushed page");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;
    use crate::recovery::FileLog;
    use crate::storage::HeapFile;
    use tempfile::tempdir;

    const TABLE: TableId = 1;

    /// Store over one table of `pages` zeroed pages.
    fn create_test_store(capacity: usize, pages: usize) -> (PageStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        std::fs::write(&path, vec![0u8; pages * PAGE_SIZE]).unwrap();

        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::new(HeapFile::open(&path, TABLE, 8).unwrap()));
        let log = Arc::new(FileLog::open(dir.path().join("wal.log")).unwrap());

        let store = PageStore::new(PageStoreConfig::with_capacity(capacity), catalog, log);
        (store, dir)
    }

    fn pid(n: u32) -> PageIdentity {
        PageIdentity::new(TABLE, n)
    }

    #[test]
    fn test_get_page_locks_and_caches() {
        let (store, _dir) = create_test_store(4, 2);
        let tid = TransactionId::new();

        let handle = store.get_page(tid, pid(0), AccessMode::ReadOnly).unwrap();
        assert_eq!(handle.id(), pid(0));
        assert!(store.holds_lock(tid, pid(0)));
        assert!(store.is_cached(pid(0)));

        let again = store.get_page(tid, pid(0), AccessMode::ReadOnly).unwrap();
        assert!(handle.ptr_eq(&again));

        let snapshot = store.stats().snapshot();
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[test]
    fn test_page_not_found() {
        let (store, _dir) = create_test_store(4, 1);
        let tid = TransactionId::new();

        let result = store.get_page(tid, pid(9), AccessMode::ReadOnly);
        assert!(matches!(result, Err(Error::PageNotFound(_))));
        assert!(!store.is_cached(pid(9)));
    }

    #[test]
    fn test_unknown_table() {
        let (store, _dir) = create_test_store(4, 1);
        let tid = TransactionId::new();

        let result = store.get_page(tid, PageIdentity::new(77, 0), AccessMode::ReadOnly);
        assert!(matches!(result, Err(Error::NoSuchTable(77))));
    }

    #[test]
    fn test_eviction_is_lru_over_clean_pages() {
        let (store, _dir) = create_test_store(3, 4);
        let tid = TransactionId::new();

        for n in 0..3 {
            store.get_page(tid, pid(n), AccessMode::ReadOnly).unwrap();
        }
        // Touch page 0 so page 1 becomes least recently used
        store.get_page(tid, pid(0), AccessMode::ReadOnly).unwrap();

        store.get_page(tid, pid(3), AccessMode::ReadOnly).unwrap();

        assert!(!store.is_cached(pid(1)));
        assert!(store.is_cached(pid(0)));
        assert_eq!(store.num_pages(), 3);
        assert_eq!(store.stats().snapshot().evictions, 1);
    }

    #[test]
    fn test_write_locked_clean_page_not_evicted() {
        let (store, _dir) = create_test_store(1, 2);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        store.get_page(t1, pid(0), AccessMode::ReadWrite).unwrap();
        let result = store.get_page(t2, pid(1), AccessMode::ReadOnly);
        assert!(matches!(result, Err(Error::CapacityExhausted { capacity: 1 })));

        store.commit(t1).unwrap();
        store.get_page(t2, pid(1), AccessMode::ReadOnly).unwrap();
        assert!(!store.is_cached(pid(0)));
    }

    #[test]
    fn test_commit_writes_dirty_page() {
        let (store, _dir) = create_test_store(4, 1);
        let tid = TransactionId::new();

        let handle = store.get_page(tid, pid(0), AccessMode::ReadWrite).unwrap();
        handle.write(tid).as_mut_slice()[0] = 0x42;
        assert_eq!(store.dirty_owner(pid(0)), Some(tid));

        store.commit(tid).unwrap();

        assert_eq!(store.dirty_owner(pid(0)), None);
        assert!(!store.holds_lock(tid, pid(0)));
        let on_disk = store.catalog().backend_for(TABLE).unwrap().read_page(pid(0)).unwrap();
        assert_eq!(on_disk.as_slice()[0], 0x42);

        let snapshot = store.stats().snapshot();
        assert_eq!(snapshot.pages_written, 1);
        assert_eq!(snapshot.log_forces, 1);
        assert_eq!(snapshot.commits, 1);
    }

    #[test]
    fn test_abort_restores_page() {
        let (store, _dir) = create_test_store(4, 1);
        let tid = TransactionId::new();

        let handle = store.get_page(tid, pid(0), AccessMode::ReadWrite).unwrap();
        handle.write(tid).as_mut_slice()[0] = 0x42;

        store.abort(tid).unwrap();

        assert_eq!(handle.read().data().as_slice()[0], 0);
        assert_eq!(store.dirty_owner(pid(0)), None);
        assert!(store.lock_manager().held_pages(tid).is_empty());
        assert_eq!(store.stats().snapshot().pages_written, 0);
    }

    #[test]
    fn test_discard() {
        let (store, _dir) = create_test_store(4, 1);
        let tid = TransactionId::new();

        store.get_page(tid, pid(0), AccessMode::ReadOnly).unwrap();
        store.discard(pid(0));
        store.discard(pid(0));

        assert!(!store.is_cached(pid(0)));
        assert_eq!(store.num_pages(), 0);
    }

    #[test]
    fn test_flush_all_pages() {
        let (store, _dir) = create_test_store(4, 3);
        let tid = TransactionId::new();

        for n in 0..3 {
            let handle = store.get_page(tid, pid(n), AccessMode::ReadWrite).unwrap();
            handle.write(tid).as_mut_slice()[0] = n as u8 + 1;
        }

        store.flush_all_pages().unwrap();

        for n in 0..3 {
            assert_eq!(store.dirty_owner(pid(n)), None);
        }
        assert_eq!(store.stats().snapshot().pages_written, 3);
        // Locks are untouched
        assert_eq!(store.lock_manager().held_pages(tid).len(), 3);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_zero_capacity_panics() {
        create_test_store(0, 1);
    }
}
