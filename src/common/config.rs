//! Configuration for StrictDB.

/// Size of a page in bytes (4KB).
///
/// Every table file is a sequence of pages of this size, and the page cache
/// holds whole pages of this size.
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages held by a [`PageStore`](crate::buffer::PageStore).
pub const DEFAULT_PAGES: usize = 50;

/// Tunables for a [`PageStore`](crate::buffer::PageStore).
///
/// # Example
/// ```
/// use strictdb::common::PageStoreConfig;
///
/// let config = PageStoreConfig::with_capacity(8);
/// assert_eq!(config.capacity, 8);
/// assert_eq!(PageStoreConfig::default().capacity, 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStoreConfig {
    /// Maximum number of resident pages.
    pub capacity: usize,
}

impl PageStoreConfig {
    /// Config with the given cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for PageStoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PAGES,
        }
    }
}
