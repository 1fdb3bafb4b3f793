//! StrictDB - a transactional page cache with strict two-phase locking.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            StrictDB                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Page Store (buffer/)                       │   │
//! │  │   get_page → lock, then cache hit or load + LRU evict    │   │
//! │  │   commit → log, force, write │ abort → before-images     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │            ↓                    ↓                    ↓          │
//! │  ┌──────────────────┐ ┌──────────────────┐ ┌─────────────────┐ │
//! │  │ concurrency/     │ │ storage/         │ │ recovery/       │ │
//! │  │ LockManager      │ │ Catalog          │ │ RecoveryLog     │ │
//! │  │ WaitForGraph     │ │ StorageBackend   │ │ FileLog         │ │
//! │  │ (S/X, deadlocks) │ │ HeapFile, Page   │ │ (WAL records)   │ │
//! │  └──────────────────┘ └──────────────────┘ └─────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageIdentity, TransactionId, Error, config)
//! - [`buffer`] - The page store, cached pages, and the LRU replacer
//! - [`concurrency`] - Page locks and deadlock detection
//! - [`storage`] - Table backends and the page format
//! - [`recovery`] - Write-ahead logging of page images
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use strictdb::{AccessMode, Catalog, FileLog, HeapFile, PageStore, PageStoreConfig};
//! use strictdb::{TransactionId, Tuple};
//!
//! # fn main() -> strictdb::Result<()> {
//! let catalog = Arc::new(Catalog::new());
//! catalog.add_table(Arc::new(HeapFile::open_or_create("people.tbl", 1, 16)?));
//! let log = Arc::new(FileLog::open("wal.log")?);
//! let store = PageStore::new(PageStoreConfig::default(), catalog, log);
//!
//! let tid = TransactionId::new();
//! let mut tuple = Tuple::new(b"sixteen bytes!!!");
//! store.insert_tuple(tid, 1, &mut tuple)?;
//! store.commit(tid)?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{AccessMode, Error, PageIdentity, PageStoreConfig, Result, TableId, TransactionId};

pub use buffer::{PageHandle, PageStore, PageStoreStats, StatsSnapshot};
pub use concurrency::LockManager;
pub use recovery::{FileLog, RecoveryLog};
pub use storage::page::Page;
pub use storage::{Catalog, HeapFile, RecordId, StorageBackend, Tuple};
