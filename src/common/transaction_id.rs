//! Transaction handles and page access modes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a running transaction.
///
/// Every call to [`TransactionId::new`] mints a handle never handed out
/// before in this process, so two handles compare equal only if one is a
/// copy of the other.
///
/// # Example
/// ```
/// use strictdb::TransactionId;
///
/// let t1 = TransactionId::new();
/// let t2 = TransactionId::new();
/// assert_ne!(t1, t2);
/// assert_eq!(t1, t1.clone());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Mint a fresh transaction handle.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        TransactionId(NEXT_TRANSACTION.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the handle, for logs and the recovery log.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({})", self.0)
    }
}

/// How a transaction intends to use a page.
///
/// `ReadOnly` asks for a shared lock, `ReadWrite` for an exclusive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    /// Whether this mode needs the exclusive lock.
    #[inline]
    pub fn is_exclusive(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_transaction_ids_unique() {
        let ids: HashSet<_> = (0..100).map(|_| TransactionId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_transaction_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..50).map(|_| TransactionId::new()).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for tid in handle.join().unwrap() {
                assert!(all.insert(tid));
            }
        }
        assert_eq!(all.len(), 400);
    }

    #[test]
    fn test_access_mode() {
        assert!(AccessMode::ReadWrite.is_exclusive());
        assert!(!AccessMode::ReadOnly.is_exclusive());
    }
}
