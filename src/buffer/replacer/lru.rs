//! LRU (Least Recently Used) replacement policy.

use std::collections::{BTreeMap, HashMap};

use crate::common::PageIdentity;

/// Least-recently-used ordering over resident pages.
///
/// The replacer only tracks recency. Whether a page may leave the cache is
/// decided by the caller at eviction time, so dirty or in-use pages are
/// skipped without losing their place in the order.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Monotonic access counter.
    clock: u64,

    /// Access stamp → page, oldest first.
    order: BTreeMap<u64, PageIdentity>,

    /// Page → its latest access stamp.
    stamps: HashMap<PageIdentity, u64>,
}

impl LruReplacer {
    /// Create an empty replacer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a page was accessed, making it the most recently used.
    pub fn record_access(&mut self, pid: PageIdentity) {
        self.clock += 1;
        if let Some(old) = self.stamps.insert(pid, self.clock) {
            self.order.remove(&old);
        }
        self.order.insert(self.clock, pid);
    }

    /// Select and remove the least recently used page accepted by `evictable`.
    ///
    /// Returns None if no tracked page is evictable.
    pub fn evict<F>(&mut self, mut evictable: F) -> Option<PageIdentity>
    where
        F: FnMut(PageIdentity) -> bool,
    {
        let (&stamp, &pid) = self.order.iter().find(|(_, &pid)| evictable(pid))?;
        self.order.remove(&stamp);
        self.stamps.remove(&pid);
        Some(pid)
    }

    /// Stop tracking a page.
    pub fn remove(&mut self, pid: PageIdentity) {
        if let Some(stamp) = self.stamps.remove(&pid) {
            self.order.remove(&stamp);
        }
    }

    /// Number of tracked pages.
    pub fn size(&self) -> usize {
        self.stamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> PageIdentity {
        PageIdentity::new(1, n)
    }

    #[test]
    fn test_lru_basic() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(|_| true), Some(pid(0)));
        assert_eq!(replacer.evict(|_| true), Some(pid(1)));
        assert_eq!(replacer.evict(|_| true), Some(pid(2)));
        assert_eq!(replacer.evict(|_| true), None);
    }

    #[test]
    fn test_lru_reaccess_reorders() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(0)); // 0 is now most recent

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(|_| true), Some(pid(1)));
        assert_eq!(replacer.evict(|_| true), Some(pid(0)));
    }

    #[test]
    fn test_lru_skips_unevictable() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));

        // Only page 1 is evictable
        assert_eq!(replacer.evict(|p| p == pid(1)), Some(pid(1)));
        assert_eq!(replacer.evict(|p| p == pid(1)), None);

        // Skipped pages keep their order
        assert_eq!(replacer.evict(|_| true), Some(pid(0)));
    }

    #[test]
    fn test_lru_remove() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.remove(pid(0));
        replacer.remove(pid(7));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(|_| true), Some(pid(1)));
    }
}
