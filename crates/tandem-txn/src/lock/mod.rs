//! Lock management for transaction isolation.
//!
//! This module implements a blocking, key-level lock manager:
//! - READ (shared) and WRITE (exclusive) modes on string keys
//! - Lock upgrading from READ to WRITE
//! - FIFO wait queues, one per key
//! - Synchronous deadlock detection on every blocking attempt
//!
//! # Lock Compatibility Matrix
//!
//! ```text
//!          │ R  │ W  │
//! ─────────┼────┼────┤
//!     R    │ ✓  │ ✗  │
//!     W    │ ✗  │ ✗  │
//! ```
//!
//! # Queueing
//!
//! A request is blocked by every other holder it conflicts with and by every
//! conflicting request queued ahead of it. Upgrade requests are queued ahead
//! of plain requests. A queued writer is therefore never overtaken by readers
//! that arrive after it, while consecutive readers are granted together.
//!
//! The wait-for edges of a blocked request are exactly its current blockers,
//! recomputed on every wake-up. A request whose edges close a cycle is
//! refused with [`LockError::Deadlock`] instead of waiting.
//!
//! # Cancellation
//!
//! [`LockManager::release`] drops every lock a transaction holds and removes
//! its queued requests. A thread blocked on one of those requests wakes up
//! with [`LockError::Cancelled`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::{Condvar, Mutex};
use tandem_common::config::CoordinatorConfig;
use tandem_common::types::TxnId;
use thiserror::Error;
use tracing::{debug, warn};

use crate::deadlock::WaitForGraph;

/// Lock mode for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockMode {
    /// Shared lock.
    Read,
    /// Exclusive lock.
    Write,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Read, LockMode::Read))
    }

    /// Returns true if holding this mode already satisfies a request for `requested`.
    pub fn covers(self, requested: LockMode) -> bool {
        self == LockMode::Write || requested == LockMode::Read
    }

    /// Returns the stronger of two lock modes.
    pub fn stronger(self, other: LockMode) -> LockMode {
        self.max(other)
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Read => write!(f, "R"),
            LockMode::Write => write!(f, "W"),
        }
    }
}

/// Result of a successful lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResult {
    /// Lock was granted.
    Granted,
    /// A held READ lock was upgraded to WRITE.
    Upgraded,
    /// Transaction already holds a lock covering the request.
    AlreadyHeld,
}

/// Lock acquisition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Waiting would close a cycle in the wait-for graph.
    #[error("deadlock detected: transaction {txn_id} waiting on {key} closes cycle {cycle:?}")]
    Deadlock {
        /// The refused transaction.
        txn_id: TxnId,
        /// The key it asked for.
        key: String,
        /// The cycle, starting and ending at `txn_id`.
        cycle: Vec<TxnId>,
    },

    /// The request was withdrawn because its transaction released its locks.
    #[error("lock request of transaction {txn_id} on {key} was cancelled")]
    Cancelled {
        /// The cancelled transaction.
        txn_id: TxnId,
        /// The key it was waiting for.
        key: String,
    },
}

impl LockError {
    /// Returns the transaction the error belongs to.
    pub fn txn_id(&self) -> TxnId {
        match self {
            LockError::Deadlock { txn_id, .. } | LockError::Cancelled { txn_id, .. } => *txn_id,
        }
    }

    /// Returns true for a deadlock refusal.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, LockError::Deadlock { .. })
    }
}

/// A queued lock request.
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// Transaction requesting the lock.
    pub txn_id: TxnId,
    /// Requested lock mode.
    pub mode: LockMode,
    /// Whether the transaction already holds READ on the key.
    pub upgrade: bool,
    ticket: u64,
}

/// Holders and waiters of a single key.
#[derive(Debug, Default)]
struct LockRecord {
    holders: HashMap<TxnId, LockMode>,
    queue: VecDeque<LockRequest>,
}

impl LockRecord {
    fn enqueue(&mut self, request: LockRequest) {
        if request.upgrade {
            let pos = self.queue.iter().take_while(|r| r.upgrade).count();
            self.queue.insert(pos, request);
        } else {
            self.queue.push_back(request);
        }
    }

    fn position(&self, ticket: u64) -> Option<usize> {
        self.queue.iter().position(|r| r.ticket == ticket)
    }

    fn dequeue(&mut self, ticket: u64) {
        self.queue.retain(|r| r.ticket != ticket);
    }

    /// Transactions blocking the queued request at `index`.
    fn blockers(&self, index: usize) -> Vec<TxnId> {
        let Some(request) = self.queue.get(index) else {
            return Vec::new();
        };

        let mut blockers: Vec<TxnId> = self
            .holders
            .iter()
            .filter(|(txn, mode)| **txn != request.txn_id && !request.mode.is_compatible_with(mode))
            .map(|(txn, _)| *txn)
            .collect();

        for ahead in self.queue.iter().take(index) {
            if ahead.txn_id != request.txn_id
                && !request.mode.is_compatible_with(&ahead.mode)
                && !blockers.contains(&ahead.txn_id)
            {
                blockers.push(ahead.txn_id);
            }
        }

        blockers.sort();
        blockers
    }

    fn is_free(&self) -> bool {
        self.holders.is_empty() && self.queue.is_empty()
    }
}

/// Everything guarded by the lock manager's mutex.
#[derive(Debug, Default)]
struct LockTable {
    records: HashMap<String, LockRecord>,
    held: HashMap<TxnId, HashSet<String>>,
    graph: WaitForGraph,
    next_ticket: u64,
}

impl LockTable {
    fn grant(&mut self, txn_id: TxnId, key: &str, mode: LockMode) -> LockResult {
        let record = self.records.entry(key.to_string()).or_default();
        let previous = record.holders.insert(txn_id, mode);
        if let Some(previous) = previous {
            record.holders.insert(txn_id, previous.stronger(mode));
        }
        self.held.entry(txn_id).or_default().insert(key.to_string());

        if previous.is_some() {
            LockResult::Upgraded
        } else {
            LockResult::Granted
        }
    }

    fn withdraw(&mut self, key: &str, ticket: u64) {
        if let Some(record) = self.records.get_mut(key) {
            record.dequeue(ticket);
            if record.is_free() {
                self.records.remove(key);
            }
        }
    }
}

/// Statistics about the lock manager.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Total lock acquisitions.
    pub acquisitions: AtomicU64,
    /// Total lock upgrades.
    pub upgrades: AtomicU64,
    /// Total requests that had to wait.
    pub waits: AtomicU64,
    /// Total deadlocks detected.
    pub deadlocks: AtomicU64,
    /// Total locks released.
    pub releases: AtomicU64,
    /// Total waits cancelled by release.
    pub cancellations: AtomicU64,
}

impl LockStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

/// Configuration for the lock manager.
#[derive(Debug, Clone)]
pub struct LockManagerConfig {
    /// Whether to enable deadlock detection.
    pub deadlock_detection: bool,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            deadlock_detection: true,
        }
    }
}

impl From<&CoordinatorConfig> for LockManagerConfig {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            deadlock_detection: config.deadlock_detection,
        }
    }
}

/// The lock manager for managing transaction locks.
pub struct LockManager {
    /// Lock records, per-transaction holdings and the wait-for graph.
    table: Mutex<LockTable>,
    /// Signalled whenever holders or queues change.
    changed: Condvar,
    /// Configuration.
    config: LockManagerConfig,
    /// Statistics.
    stats: LockStats,
}

impl LockManager {
    /// Creates a new lock manager with default configuration.
    pub fn new() -> Self {
        Self::with_config(LockManagerConfig::default())
    }

    /// Creates a lock manager with custom configuration.
    pub fn with_config(config: LockManagerConfig) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            changed: Condvar::new(),
            config,
            stats: LockStats::new(),
        }
    }

    /// Acquires `mode` on `key` for `txn_id`, blocking until it is granted.
    ///
    /// Returns [`LockError::Deadlock`] without waiting if waiting would
    /// close a cycle, and [`LockError::Cancelled`] if the transaction is
    /// released while this request is queued.
    pub fn acquire(&self, txn_id: TxnId, key: &str, mode: LockMode) -> Result<LockResult, LockError> {
        let mut table = self.table.lock();

        let held = table
            .records
            .get(key)
            .and_then(|r| r.holders.get(&txn_id).copied());
        if held.is_some_and(|h| h.covers(mode)) {
            return Ok(LockResult::AlreadyHeld);
        }

        let ticket = table.next_ticket;
        table.next_ticket += 1;
        table.records.entry(key.to_string()).or_default().enqueue(LockRequest {
            txn_id,
            mode,
            upgrade: held.is_some(),
            ticket,
        });

        let mut waited = false;
        loop {
            let blockers = table
                .records
                .get(key)
                .and_then(|r| r.position(ticket).map(|index| r.blockers(index)));

            let Some(blockers) = blockers else {
                table.graph.clear_waits(txn_id);
                LockStats::bump(&self.stats.cancellations);
                debug!(txn_id = %txn_id, key, "lock wait cancelled");
                return Err(LockError::Cancelled {
                    txn_id,
                    key: key.to_string(),
                });
            };

            if blockers.is_empty() {
                table.withdraw(key, ticket);
                table.graph.clear_waits(txn_id);
                let result = table.grant(txn_id, key, mode);
                match result {
                    LockResult::Upgraded => LockStats::bump(&self.stats.upgrades),
                    _ => LockStats::bump(&self.stats.acquisitions),
                }
                if waited {
                    self.changed.notify_all();
                }
                return Ok(result);
            }

            if self.config.deadlock_detection {
                table.graph.set_waits(txn_id, blockers.iter().copied());
                if let Some(info) = table.graph.detect_deadlock(txn_id) {
                    table.withdraw(key, ticket);
                    table.graph.clear_waits(txn_id);
                    LockStats::bump(&self.stats.deadlocks);
                    warn!(txn_id = %txn_id, key, cycle = ?info.cycle, "deadlock detected");
                    self.changed.notify_all();
                    return Err(LockError::Deadlock {
                        txn_id,
                        key: key.to_string(),
                        cycle: info.cycle,
                    });
                }
            }

            if !waited {
                waited = true;
                LockStats::bump(&self.stats.waits);
                debug!(txn_id = %txn_id, key, %mode, blockers = ?blockers, "waiting for lock");
            }

            self.changed.wait(&mut table);
        }
    }

    /// Releases every lock held by a transaction and cancels its queued requests.
    ///
    /// Returns the number of locks released.
    pub fn release(&self, txn_id: TxnId) -> usize {
        let released = {
            let mut table = self.table.lock();
            let keys = table.held.remove(&txn_id).unwrap_or_default();

            for key in &keys {
                if let Some(record) = table.records.get_mut(key) {
                    record.holders.remove(&txn_id);
                }
            }
            for record in table.records.values_mut() {
                record.queue.retain(|r| r.txn_id != txn_id);
            }
            table.records.retain(|_, r| !r.is_free());
            table.graph.remove_txn(txn_id);

            keys.len()
        };

        self.stats
            .releases
            .fetch_add(released as u64, AtomicOrdering::Relaxed);
        self.changed.notify_all();

        if released > 0 {
            debug!(txn_id = %txn_id, released, "released locks");
        }
        released
    }

    /// Returns statistics about the lock manager.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Returns the holders of a key, sorted by transaction.
    pub fn holders(&self, key: &str) -> Vec<(TxnId, LockMode)> {
        let table = self.table.lock();
        let mut holders: Vec<(TxnId, LockMode)> = table
            .records
            .get(key)
            .map(|r| r.holders.iter().map(|(t, m)| (*t, *m)).collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    /// Returns the mode a transaction holds on a key, if any.
    pub fn mode_held(&self, txn_id: TxnId, key: &str) -> Option<LockMode> {
        self.table
            .lock()
            .records
            .get(key)
            .and_then(|r| r.holders.get(&txn_id).copied())
    }

    /// Returns the keys locked by a transaction, sorted.
    pub fn locks_held(&self, txn_id: TxnId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .table
            .lock()
            .held
            .get(&txn_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Returns true if the transaction has a queued request on any key.
    pub fn is_waiting(&self, txn_id: TxnId) -> bool {
        self.table
            .lock()
            .records
            .values()
            .any(|r| r.queue.iter().any(|q| q.txn_id == txn_id))
    }

    /// Returns the transactions a waiting transaction is blocked by.
    ///
    /// Always empty when deadlock detection is disabled.
    pub fn waits_for(&self, txn_id: TxnId) -> Vec<TxnId> {
        self.table.lock().graph.get_waits(txn_id)
    }

    /// Returns the number of queued requests on a key.
    pub fn queue_len(&self, key: &str) -> usize {
        self.table
            .lock()
            .records
            .get(key)
            .map_or(0, |r| r.queue.len())
    }

    /// Returns the number of keys with holders or waiters.
    pub fn lock_count(&self) -> usize {
        self.table.lock().records.len()
    }

    /// Returns the number of transactions holding locks.
    pub fn txn_count(&self) -> usize {
        self.table.lock().held.len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("lock_count", &self.lock_count())
            .field("txn_count", &self.txn_count())
            .field("deadlock_detection", &self.config.deadlock_detection)
            .finish()
    }
}
