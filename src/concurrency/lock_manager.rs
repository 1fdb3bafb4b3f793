//! Lock Manager - page-granularity shared/exclusive locks.
//!
//! The [`LockManager`] provides:
//! - Shared (read) and exclusive (write) locks per page
//! - Lock upgrade from shared to exclusive
//! - Blocking acquisition with wait-for-graph deadlock detection
//! - Per-transaction bookkeeping of held pages

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use crate::common::{AccessMode, Error, PageIdentity, Result, TransactionId};
use crate::concurrency::WaitForGraph;

/// Who holds the exclusive lock on a page.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExclusiveHolder {
    #[default]
    Unlocked,
    HeldBy(TransactionId),
}

/// Holders of one page's lock.
///
/// When `exclusive` is `HeldBy(..)`, `shared` is empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub shared: HashSet<TransactionId>,
    pub exclusive: ExclusiveHolder,
}

impl LockRecord {
    /// The mode `tid` currently holds this lock in, if any.
    pub fn mode_of(&self, tid: TransactionId) -> Option<AccessMode> {
        if self.exclusive == ExclusiveHolder::HeldBy(tid) {
            Some(AccessMode::ReadWrite)
        } else if self.shared.contains(&tid) {
            Some(AccessMode::ReadOnly)
        } else {
            None
        }
    }

    /// Whether no transaction holds this lock.
    pub fn is_free(&self) -> bool {
        self.exclusive == ExclusiveHolder::Unlocked && self.shared.is_empty()
    }

    /// Transactions `tid` has to wait for before it can hold the lock in `mode`.
    ///
    /// Empty means the request can be granted now. `tid`'s own shared hold
    /// never blocks its upgrade.
    fn blockers(&self, tid: TransactionId, mode: AccessMode) -> HashSet<TransactionId> {
        let mut blockers = HashSet::new();

        if let ExclusiveHolder::HeldBy(holder) = self.exclusive {
            if holder != tid {
                blockers.insert(holder);
            }
            return blockers;
        }

        if mode.is_exclusive() {
            blockers.extend(self.shared.iter().copied().filter(|&t| t != tid));
        }
        blockers
    }

    /// Record `tid` as a holder. Returns whether the holder set changed.
    fn grant(&mut self, tid: TransactionId, mode: AccessMode) -> bool {
        match mode {
            AccessMode::ReadOnly => {
                if self.exclusive == ExclusiveHolder::HeldBy(tid) {
                    false
                } else {
                    self.shared.insert(tid)
                }
            }
            AccessMode::ReadWrite => {
                if self.exclusive == ExclusiveHolder::HeldBy(tid) {
                    return false;
                }
                self.shared.remove(&tid);
                self.exclusive = ExclusiveHolder::HeldBy(tid);
                true
            }
        }
    }

    /// Drop any hold of `tid`. Returns whether it held anything.
    fn release(&mut self, tid: TransactionId) -> bool {
        let mut released = self.shared.remove(&tid);
        if self.exclusive == ExclusiveHolder::HeldBy(tid) {
            self.exclusive = ExclusiveHolder::Unlocked;
            released = true;
        }
        released
    }
}

/// One page's lock: its holders plus the waiters parked on it.
#[derive(Default)]
struct LockSlot {
    record: Mutex<LockRecord>,
    /// Signalled whenever the holder set changes.
    changed: Condvar,
}

/// Bookkeeping shared by all pages.
#[derive(Default)]
struct Holdings {
    waits: WaitForGraph,
    held: HashMap<TransactionId, HashSet<PageIdentity>>,
}

/// Grants page locks to transactions.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────┐
/// │                       LockManager                        │
/// │  ┌────────────────────────────┐  ┌────────────────────┐  │
/// │  │ slots: DashMap             │  │ holdings: Mutex    │  │
/// │  │ PageIdentity → LockSlot    │  │  WaitForGraph      │  │
/// │  │  (Mutex<LockRecord>,       │  │  tid → held pages  │  │
/// │  │   Condvar)                 │  │                    │  │
/// │  └────────────────────────────┘  └────────────────────┘  │
/// └──────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - Each page has its own `LockSlot`, so unrelated pages never contend.
/// - `holdings` is taken after a slot's mutex and never the other way round.
/// - Waiters sleep on their page's condvar, which is signalled on every
///   grant and release there. A woken waiter recomputes its wait-for edges
///   and re-runs cycle detection before sleeping again.
///
/// Deadlocks are detected, not prevented: the request that closes a cycle
/// fails with [`Error::DeadlockDetected`]. There is no timeout and no FIFO
/// ordering among waiters.
#[derive(Default)]
pub struct LockManager {
    slots: DashMap<PageIdentity, Arc<LockSlot>>,
    holdings: Mutex<Holdings>,
}

impl LockManager {
    /// Create a lock manager with no locks held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `tid` holds `pid` in `mode`.
    ///
    /// A `ReadWrite` request from a shared holder upgrades its lock.
    ///
    /// # Errors
    /// - `Error::DeadlockDetected` if waiting would close a cycle in the
    ///   wait-for graph. Locks `tid` already holds are kept; the caller is
    ///   expected to abort the transaction.
    pub fn acquire(&self, tid: TransactionId, pid: PageIdentity, mode: AccessMode) -> Result<()> {
        let slot = self.slot(pid);
        let mut record = slot.record.lock();

        loop {
            let blockers = record.blockers(tid, mode);

            if blockers.is_empty() {
                let changed = record.grant(tid, mode);
                {
                    let mut holdings = self.holdings.lock();
                    holdings.waits.clear(tid);
                    holdings.held.entry(tid).or_default().insert(pid);
                }
                if changed {
                    slot.changed.notify_all();
                    tracing::debug!(%tid, page = %pid, ?mode, "lock granted");
                } else {
                    tracing::trace!(%tid, page = %pid, ?mode, "lock already held");
                }
                return Ok(());
            }

            {
                let mut holdings = self.holdings.lock();
                holdings.waits.set_waits(tid, blockers);
                if holdings.waits.has_cycle_through(tid) {
                    tracing::warn!(
                        %tid,
                        page = %pid,
                        ?mode,
                        waits_for = ?holdings.waits.waits_of(tid),
                        "deadlock detected"
                    );
                    holdings.waits.clear(tid);
                    return Err(Error::DeadlockDetected { tid, page: pid });
                }
            }

            tracing::debug!(%tid, page = %pid, ?mode, "waiting for lock");
            slot.changed.wait(&mut record);
        }
    }

    /// Drop `tid`'s hold on `pid`. No-op if it holds none.
    pub fn release(&self, tid: TransactionId, pid: PageIdentity) {
        if let Some(slot) = self.existing_slot(pid) {
            {
                let mut record = slot.record.lock();
                if record.release(tid) {
                    slot.changed.notify_all();
                    tracing::debug!(%tid, page = %pid, "lock released");
                }
            }
            drop(slot);
            self.prune_slot(pid);
        }

        let mut holdings = self.holdings.lock();
        if let Some(pages) = holdings.held.get_mut(&tid) {
            pages.remove(&pid);
            if pages.is_empty() {
                holdings.held.remove(&tid);
            }
        }
    }

    /// Drop every lock `tid` holds. No-op if it holds none.
    pub fn release_all(&self, tid: TransactionId) {
        let pages = {
            let mut holdings = self.holdings.lock();
            holdings.waits.clear(tid);
            holdings.held.remove(&tid).unwrap_or_default()
        };

        for pid in &pages {
            if let Some(slot) = self.existing_slot(*pid) {
                {
                    let mut record = slot.record.lock();
                    if record.release(tid) {
                        slot.changed.notify_all();
                    }
                }
                drop(slot);
                self.prune_slot(*pid);
            }
        }

        if !pages.is_empty() {
            tracing::debug!(%tid, pages = pages.len(), "released all locks");
        }
    }

    /// Whether `tid` holds a lock (in either mode) on `pid`.
    pub fn holds(&self, tid: TransactionId, pid: PageIdentity) -> bool {
        self.holdings
            .lock()
            .held
            .get(&tid)
            .is_some_and(|pages| pages.contains(&pid))
    }

    /// Every page `tid` currently holds a lock on.
    pub fn held_pages(&self, tid: TransactionId) -> HashSet<PageIdentity> {
        self.holdings
            .lock()
            .held
            .get(&tid)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the holders of `pid`'s lock.
    pub fn lock_record(&self, pid: PageIdentity) -> LockRecord {
        self.existing_slot(pid)
            .map(|slot| slot.record.lock().clone())
            .unwrap_or_default()
    }

    /// Whether some transaction holds `pid` exclusively.
    pub fn is_write_locked(&self, pid: PageIdentity) -> bool {
        self.existing_slot(pid).is_some_and(|slot| {
            matches!(slot.record.lock().exclusive, ExclusiveHolder::HeldBy(_))
        })
    }

    /// Number of transactions currently blocked in [`acquire`](Self::acquire).
    pub fn waiting_count(&self) -> usize {
        self.holdings.lock().waits.waiting_count()
    }

    /// The slot for `pid`, created on first use.
    fn slot(&self, pid: PageIdentity) -> Arc<LockSlot> {
        Arc::clone(self.slots.entry(pid).or_default().value())
    }

    fn existing_slot(&self, pid: PageIdentity) -> Option<Arc<LockSlot>> {
        self.slots.get(&pid).map(|slot| Arc::clone(slot.value()))
    }

    /// Drop `pid`'s slot once nobody holds or waits for it.
    ///
    /// New references are only cloned out of the map under its shard lock,
    /// which `remove_if` holds, so a count of one cannot grow meanwhile.
    fn prune_slot(&self, pid: PageIdentity) {
        self.slots.remove_if(&pid, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.record.lock().is_free()
        });
    }
}
