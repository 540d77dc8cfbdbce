//! Deadlock detection using wait-for graph analysis.
//!
//! The wait-for graph (WFG) tracks which transactions are blocked on which:
//!
//! ```text
//! T1 waits for T2:  T1 -> T2
//! T2 waits for T3:  T2 -> T3
//! T3 waits for T1:  T3 -> T1 (cycle = deadlock!)
//! ```
//!
//! The graph carries no lock of its own. It lives inside the lock table and
//! is only touched while the lock table mutex is held, so an edge update and
//! the cycle check that follows it observe the same state.
//!
//! # Victim Selection
//!
//! The transaction whose blocking attempt closes a cycle is the victim. It
//! never waits; the other members of the cycle keep waiting and proceed once
//! the victim's locks are released.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use tandem_common::types::TxnId;

/// Result of deadlock detection.
#[derive(Debug, Clone)]
pub struct DeadlockInfo {
    /// The cycle of transactions involved, starting and ending at the victim.
    pub cycle: Vec<TxnId>,
    /// The transaction refused to break the cycle.
    pub victim: TxnId,
    /// When the deadlock was detected.
    pub detected_at: Instant,
}

/// The wait-for graph for deadlock detection.
#[derive(Default)]
pub struct WaitForGraph {
    /// Edges: waiter -> set of transactions it is blocked by.
    edges: HashMap<TxnId, HashSet<TxnId>>,
}

impl WaitForGraph {
    /// Creates a new empty wait-for graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every outgoing edge of `waiter` with edges to `blockers`.
    ///
    /// An empty blocker set clears the waiter from the graph.
    pub fn set_waits(&mut self, waiter: TxnId, blockers: impl IntoIterator<Item = TxnId>) {
        let targets: HashSet<TxnId> = blockers.into_iter().filter(|t| *t != waiter).collect();
        if targets.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, targets);
        }
    }

    /// Adds a single wait-for edge: waiter is waiting for holder.
    pub fn add_wait(&mut self, waiter: TxnId, holder: TxnId) {
        if waiter != holder {
            self.edges.entry(waiter).or_default().insert(holder);
        }
    }

    /// Clears all waits for a transaction.
    pub fn clear_waits(&mut self, waiter: TxnId) {
        self.edges.remove(&waiter);
    }

    /// Removes a transaction from the graph, including edges pointing to it.
    pub fn remove_txn(&mut self, txn_id: TxnId) {
        self.edges.remove(&txn_id);
        self.edges.retain(|_, targets| {
            targets.remove(&txn_id);
            !targets.is_empty()
        });
    }

    /// Detects a cycle passing through `start`.
    ///
    /// Cycles among other transactions that `start` merely reaches are not
    /// reported; they were (or will be) reported to their own members.
    pub fn detect_deadlock(&self, start: TxnId) -> Option<DeadlockInfo> {
        let mut visited = HashSet::new();
        let mut path = vec![start];

        if self.dfs_find_cycle(start, start, &mut visited, &mut path) {
            Some(DeadlockInfo {
                cycle: path,
                victim: start,
                detected_at: Instant::now(),
            })
        } else {
            None
        }
    }

    /// DFS back to `target`. On success `path` holds the cycle.
    fn dfs_find_cycle(
        &self,
        current: TxnId,
        target: TxnId,
        visited: &mut HashSet<TxnId>,
        path: &mut Vec<TxnId>,
    ) -> bool {
        let Some(targets) = self.edges.get(&current) else {
            return false;
        };

        for &next in targets {
            if next == target {
                path.push(next);
                return true;
            }
            if visited.insert(next) {
                path.push(next);
                if self.dfs_find_cycle(next, target, visited, path) {
                    return true;
                }
                path.pop();
            }
        }

        false
    }

    /// Returns the number of waiting transactions.
    pub fn txn_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the number of wait edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashSet::len).sum()
    }

    /// Returns what a transaction is waiting for, sorted.
    pub fn get_waits(&self, waiter: TxnId) -> Vec<TxnId> {
        let mut waits: Vec<TxnId> = self
            .edges
            .get(&waiter)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        waits.sort();
        waits
    }

    /// Checks if a transaction is waiting.
    pub fn is_waiting(&self, txn_id: TxnId) -> bool {
        self.edges.contains_key(&txn_id)
    }
}

impl fmt::Debug for WaitForGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitForGraph")
            .field("txn_count", &self.txn_count())
            .field("edge_count", &self.edge_count())
            .finish()
    }
}
