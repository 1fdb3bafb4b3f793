//! Page identifier type.

use std::fmt;

/// Identifies a table (and therefore its storage backend).
pub type TableId = u32;

/// Identifies one on-disk page: a table plus a page number inside it.
///
/// Equal and hashable by content, so it can key both the page cache and the
/// lock table.
///
/// # Example
/// ```
/// use strictdb::PageIdentity;
///
/// let pid = PageIdentity::new(7, 42);
/// assert_eq!(pid.table_id, 7);
/// assert_eq!(pid.page_no, 42);
/// assert_eq!(pid, PageIdentity::new(7, 42));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageIdentity {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageIdentity {
    /// Create a new PageIdentity.
    #[inline]
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id, self.page_no)
    }
}
