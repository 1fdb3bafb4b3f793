//! Error types for StrictDB.

use thiserror::Error;

use crate::common::{PageIdentity, TableId, TransactionId};
use crate::storage::RecordId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors surfaced by the page store and lock manager.
#[derive(Debug, Error)]
pub enum Error {
    /// The lock request of `tid` on `page` closed a cycle in the wait-for graph.
    ///
    /// Nothing is rolled back; the caller must abort `tid`.
    #[error("{tid} aborted: deadlock detected while waiting for {page}")]
    DeadlockDetected { tid: TransactionId, page: PageIdentity },

    /// I/O failure inside a storage backend or the recovery log.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Every cached page is dirty or exclusively locked, so nothing can be evicted.
    #[error("page cache exhausted: none of {capacity} cached pages can be evicted")]
    CapacityExhausted { capacity: usize },

    /// Requested page lies past the end of its table file.
    #[error("{0} not found")]
    PageNotFound(PageIdentity),

    /// No storage backend is registered for the table.
    #[error("no table with id {0}")]
    NoSuchTable(TableId),

    /// The tuple has no record id, so the page holding it is unknown.
    #[error("tuple is not stored in any page")]
    TupleNotStored,

    /// Tuple width does not match the table's fixed tuple width.
    #[error("tuple is {actual} bytes, table stores {expected}-byte tuples")]
    TupleSize { expected: usize, actual: usize },

    /// The slot a delete points at holds no tuple.
    #[error("{0} holds no tuple")]
    SlotEmpty(RecordId),

    /// A log record failed its checksum or was cut short.
    #[error("corrupt log record at offset {offset}")]
    CorruptLog { offset: u64 },
}

impl Error {
    /// Whether this error means the transaction lost a deadlock.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Error::DeadlockDetected { .. })
    }

    /// Whether this error means the cache had no clean page to give up.
    pub fn is_capacity_exhausted(&self) -> bool {
        matches!(self, Error::CapacityExhausted { .. })
    }
}
