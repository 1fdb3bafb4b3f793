//! Recovery logging.
//!
//! - [`RecoveryLog`] - What the page store needs from a write-ahead log
//! - [`FileLog`] - Append-only, checksummed log file
//! - [`LogRecord`] - One before/after image pair read back from a log

mod file_log;

pub use file_log::{FileLog, LogRecord};

use crate::common::{PageIdentity, Result, TransactionId};
use crate::storage::page::Page;

/// Write-ahead log of page images.
///
/// During commit the page store calls [`log_write`](Self::log_write) and
/// then [`force`](Self::force) for a dirty page before that page is written
/// to its backend.
pub trait RecoveryLog: Send + Sync {
    /// Append the before/after images of `pid` as changed by `tid`.
    fn log_write(
        &self,
        tid: TransactionId,
        pid: PageIdentity,
        before: &Page,
        after: &Page,
    ) -> Result<()>;

    /// Make every appended record durable.
    fn force(&self) -> Result<()>;
}
