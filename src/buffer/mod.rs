//! Page cache management.
//!
//! The page store is the in-memory cache between query operators and table
//! files. Every page it hands out is locked on behalf of a transaction first.
//!
//! # Components
//! - [`PageStore`] - The page cache, tied to the lock manager and recovery log
//! - [`CachedPage`] / [`PageHandle`] - A resident page and a handle on it
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`PageStoreStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod cached_page;
mod page_guard;
mod page_store;
pub mod replacer;
mod stats;

pub use cached_page::{CachedPage, PageHandle};
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use page_store::PageStore;
pub use stats::{PageStoreStats, StatsSnapshot};
