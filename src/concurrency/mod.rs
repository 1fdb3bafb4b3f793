//! Transaction concurrency control.
//!
//! Strict two-phase locking at page granularity:
//! - [`LockManager`] - Per-page shared/exclusive locks, blocking acquisition
//! - [`LockRecord`] / [`ExclusiveHolder`] - The holders of one page's lock
//! - [`WaitForGraph`] - Who waits on whom, used to detect deadlocks

mod lock_manager;
mod wait_for;

pub use lock_manager::{ExclusiveHolder, LockManager, LockRecord};
pub use wait_for::WaitForGraph;
