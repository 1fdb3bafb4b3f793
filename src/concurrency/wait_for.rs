//! Wait-for graph for deadlock detection.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::common::TransactionId;

/// Directed graph of blocked transactions.
///
/// An edge `a -> b` means `a` is waiting for a lock `b` holds. A transaction's
/// out-edges are replaced wholesale on every blocking attempt and dropped once
/// it gets its lock, so the graph only describes waits that are current.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of transactions `tid` is waiting for.
    pub fn set_waits(&mut self, tid: TransactionId, holders: HashSet<TransactionId>) {
        if holders.is_empty() {
            self.edges.remove(&tid);
        } else {
            self.edges.insert(tid, holders);
        }
    }

    /// Drop every out-edge of `tid`.
    pub fn clear(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
    }

    /// The transactions `tid` is currently waiting for.
    pub fn waits_of(&self, tid: TransactionId) -> Option<&HashSet<TransactionId>> {
        self.edges.get(&tid)
    }

    /// Whether `tid` is on a cycle, i.e. reachable from its own waits.
    ///
    /// Breadth-first over the wait-for closure of `tid`. Paths that merge
    /// again without coming back to `tid` are not cycles.
    pub fn has_cycle_through(&self, tid: TransactionId) -> bool {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<TransactionId> = match self.edges.get(&tid) {
            Some(waits) => waits.iter().copied().collect(),
            None => return false,
        };

        while let Some(current) = queue.pop_front() {
            if current == tid {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(next) = self.edges.get(&current) {
                queue.extend(next.iter().copied());
            }
        }

        false
    }

    /// Number of transactions with at least one out-edge.
    pub fn waiting_count(&self) -> usize {
        self.edges.len()
    }
}
