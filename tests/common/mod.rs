//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use strictdb::{
    AccessMode, Catalog, Error, Page, PageHandle, PageIdentity, PageStore, PageStoreConfig,
    RecoveryLog, Result, StorageBackend, TableId, TransactionId, Tuple,
};

pub const TABLE: TableId = 1;

/// Something a backend or log did, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Read(PageIdentity),
    Write(PageIdentity),
    LogWrite(TransactionId, PageIdentity),
    Force,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// In-memory table that records every read and write.
///
/// Inserting a tuple copies its bytes to the start of page 0.
pub struct MemoryBackend {
    table_id: TableId,
    pages: Mutex<Vec<Page>>,
    events: EventLog,
    failing_page: Mutex<Option<u32>>,
}

impl MemoryBackend {
    pub fn new(table_id: TableId, num_pages: usize, events: EventLog) -> Self {
        Self {
            table_id,
            pages: Mutex::new((0..num_pages).map(|_| Page::new()).collect()),
            events,
            failing_page: Mutex::new(None),
        }
    }

    /// Make writes to `page_no` fail with an I/O error, or stop failing.
    pub fn fail_writes_to(&self, page_no: Option<u32>) {
        *self.failing_page.lock() = page_no;
    }

    /// First byte of a page as the table holds it, bypassing any cache.
    pub fn stored_byte(&self, page_no: u32) -> u8 {
        self.pages.lock()[page_no as usize].as_slice()[0]
    }
}

impl StorageBackend for MemoryBackend {
    fn id(&self) -> TableId {
        self.table_id
    }

    fn num_pages(&self) -> Result<u32> {
        Ok(self.pages.lock().len() as u32)
    }

    fn read_page(&self, pid: PageIdentity) -> Result<Page> {
        let pages = self.pages.lock();
        let page = pages
            .get(pid.page_no as usize)
            .ok_or(Error::PageNotFound(pid))?;
        self.events.lock().push(Event::Read(pid));
        Ok(Page::from_bytes(page.as_slice()))
    }

    fn write_page(&self, pid: PageIdentity, page: &Page) -> Result<()> {
        if *self.failing_page.lock() == Some(pid.page_no) {
            return Err(io::Error::other("write failed").into());
        }

        let mut pages = self.pages.lock();
        let slot = pages
            .get_mut(pid.page_no as usize)
            .ok_or(Error::PageNotFound(pid))?;
        slot.copy_from(page);
        self.events.lock().push(Event::Write(pid));
        Ok(())
    }

    fn insert_tuple(
        &self,
        store: &PageStore,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageHandle>> {
        let pid = PageIdentity::new(self.table_id, 0);
        let handle = store.get_page(tid, pid, AccessMode::ReadWrite)?;
        {
            let mut page = handle.write(tid);
            page.as_mut_slice()[..tuple.data().len()].copy_from_slice(tuple.data());
        }
        Ok(vec![handle])
    }

    fn delete_tuple(
        &self,
        store: &PageStore,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageHandle>> {
        let rid = tuple.record_id().ok_or(Error::TupleNotStored)?;
        let handle = store.get_page(tid, rid.page, AccessMode::ReadWrite)?;
        {
            let mut page = handle.write(tid);
            page.as_mut_slice()[..tuple.data().len()].fill(0);
        }
        Ok(vec![handle])
    }
}

/// Log that remembers what it was asked to do, optionally failing to force.
pub struct RecordingLog {
    events: EventLog,
    fail_force: bool,
}

impl RecordingLog {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            fail_force: false,
        }
    }

    pub fn failing(events: EventLog) -> Self {
        Self {
            events,
            fail_force: true,
        }
    }
}

impl RecoveryLog for RecordingLog {
    fn log_write(
        &self,
        tid: TransactionId,
        pid: PageIdentity,
        _before: &Page,
        _after: &Page,
    ) -> Result<()> {
        self.events.lock().push(Event::LogWrite(tid, pid));
        Ok(())
    }

    fn force(&self) -> Result<()> {
        if self.fail_force {
            return Err(io::Error::other("disk full").into());
        }
        self.events.lock().push(Event::Force);
        Ok(())
    }
}

/// A page store over one in-memory table, with its event log.
pub struct Fixture {
    pub store: Arc<PageStore>,
    pub backend: Arc<MemoryBackend>,
    pub events: EventLog,
}

impl Fixture {
    pub fn new(capacity: usize, num_pages: usize) -> Self {
        let events = EventLog::default();
        let log = Arc::new(RecordingLog::new(Arc::clone(&events)));
        Self::with_log(capacity, num_pages, events, log)
    }

    pub fn with_log(
        capacity: usize,
        num_pages: usize,
        events: EventLog,
        log: Arc<dyn RecoveryLog>,
    ) -> Self {
        init_tracing();
        let backend = Arc::new(MemoryBackend::new(TABLE, num_pages, Arc::clone(&events)));
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(backend.clone());

        let store = Arc::new(PageStore::new(
            PageStoreConfig::with_capacity(capacity),
            catalog,
            log,
        ));
        Self {
            store,
            backend,
            events,
        }
    }

    /// Events recorded since the last call.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

pub fn pid(page_no: u32) -> PageIdentity {
    PageIdentity::new(TABLE, page_no)
}

/// Set the first byte of `pid` on behalf of `tid`.
pub fn write_byte(store: &PageStore, tid: TransactionId, pid: PageIdentity, byte: u8) -> Result<()> {
    let handle = store.get_page(tid, pid, AccessMode::ReadWrite)?;
    handle.write(tid).as_mut_slice()[0] = byte;
    Ok(())
}

/// First byte of `pid` as `tid` sees it.
pub fn read_byte(store: &PageStore, tid: TransactionId, pid: PageIdentity) -> Result<u8> {
    let handle = store.get_page(tid, pid, AccessMode::ReadOnly)?;
    let byte = handle.read().data().as_slice()[0];
    Ok(byte)
}

/// Poll `condition` until it holds, panicking after a few seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
