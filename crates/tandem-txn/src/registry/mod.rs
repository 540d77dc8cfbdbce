//! Transaction registry for tracking transaction lifecycle.
//!
//! The registry is the coordinator's record of every transaction it began:
//! its state, its time-to-live, when it was last used, and which
//! participants it has enlisted.
//!
//! # Transaction States
//!
//! ```text
//! ┌───────┐    begin()    ┌────────┐
//! │ Start │──────────────▶│ Active │
//! └───────┘               └────────┘
//!                              │ claim()
//!                    ┌────────┴────────┐
//!                    ▼                 ▼
//!             ┌────────────┐    ┌──────────┐
//!             │ Committing │    │ Aborting │
//!             └────────────┘    └──────────┘
//!                    │ complete()      │ complete()
//!                    ▼                 ▼
//!             ┌───────────┐     ┌──────────┐
//!             │ Committed │     │ Aborted  │
//!             └───────────┘     └──────────┘
//! ```
//!
//! [`TransactionRegistry::claim`] is the only way out of `Active`. Commit,
//! abort and the TTL reaper all race through it, and exactly one of them
//! wins. A committing transaction may still end `Aborted` when a
//! participant fails to commit.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tandem_common::error::{TxnError, TxnResult};
use tandem_common::types::{ResourceKind, TxnId};

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction is in the process of committing.
    Committing,
    /// Transaction has been committed.
    Committed,
    /// Transaction is in the process of aborting.
    Aborting,
    /// Transaction has been aborted.
    Aborted,
}

impl TransactionState {
    /// Returns true if the transaction can perform operations.
    pub fn is_active(&self) -> bool {
        *self == TransactionState::Active
    }

    /// Returns true if the transaction has ended.
    pub fn is_ended(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }

    /// Converts a non-active state into the error an operation on it raises.
    ///
    /// Committing and committed transactions are invalid; aborting and
    /// aborted ones are aborted.
    pub fn to_error(self, txn_id: TxnId) -> TxnError {
        match self {
            TransactionState::Active => TxnError::internal(format!("{txn_id} is active")),
            TransactionState::Committing => TxnError::invalid(txn_id, "commit in progress"),
            TransactionState::Committed => TxnError::invalid(txn_id, "already committed"),
            TransactionState::Aborting => TxnError::aborted(txn_id, "abort in progress"),
            TransactionState::Aborted => TxnError::aborted(txn_id, "already aborted"),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Active => write!(f, "Active"),
            TransactionState::Committing => write!(f, "Committing"),
            TransactionState::Committed => write!(f, "Committed"),
            TransactionState::Aborting => write!(f, "Aborting"),
            TransactionState::Aborted => write!(f, "Aborted"),
        }
    }
}

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All writes were applied.
    Committed,
    /// All writes were discarded.
    Aborted,
}

impl Outcome {
    /// Returns the terminal state for this outcome.
    pub fn state(self) -> TransactionState {
        match self {
            Outcome::Committed => TransactionState::Committed,
            Outcome::Aborted => TransactionState::Aborted,
        }
    }

    /// Converts the outcome into the error raised by a later operation on the xid.
    pub fn to_error(self, txn_id: TxnId) -> TxnError {
        self.state().to_error(txn_id)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.state(), f)
    }
}

/// A live transaction's registry entry.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Transaction ID.
    id: TxnId,
    /// Current state.
    state: TransactionState,
    /// Idle time after which the transaction is reaped.
    ttl: Duration,
    /// When the transaction began.
    started_at: Instant,
    /// When an operation last used the transaction.
    last_accessed: Instant,
    /// Enlisted participants, in commit order.
    participants: BTreeSet<ResourceKind>,
}

impl Transaction {
    fn new(id: TxnId, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            id,
            state: TransactionState::Active,
            ttl,
            started_at: now,
            last_accessed: now,
            participants: BTreeSet::new(),
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns how long the transaction has been running.
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns when the transaction was last used.
    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    /// Returns the enlisted participants in commit order.
    pub fn participants(&self) -> Vec<ResourceKind> {
        self.participants.iter().copied().collect()
    }

    /// Returns true if the transaction has been idle longer than its TTL at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_accessed) > self.ttl
    }
}

/// Statistics about the transaction registry.
#[derive(Debug, Default)]
pub struct TransactionStats {
    /// Total transactions started.
    pub started: AtomicU64,
    /// Total transactions committed.
    pub committed: AtomicU64,
    /// Total transactions aborted.
    pub aborted: AtomicU64,
    /// Currently live transactions (active or finishing).
    pub active: AtomicU64,
}

impl TransactionStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
struct RegistryMaps {
    live: HashMap<TxnId, Transaction>,
    finished: HashMap<TxnId, Outcome>,
}

impl RegistryMaps {
    fn state(&self, txn_id: TxnId) -> Option<TransactionState> {
        self.live
            .get(&txn_id)
            .map(Transaction::state)
            .or_else(|| self.finished.get(&txn_id).map(|o| o.state()))
    }

    /// Returns the active entry or the error an operation on `txn_id` raises.
    fn active_mut(&mut self, txn_id: TxnId) -> TxnResult<&mut Transaction> {
        match self.state(txn_id) {
            None => Err(TxnError::invalid(txn_id, "unknown transaction")),
            Some(TransactionState::Active) => self
                .live
                .get_mut(&txn_id)
                .ok_or_else(|| TxnError::internal(format!("{txn_id} missing from registry"))),
            Some(state) => Err(state.to_error(txn_id)),
        }
    }
}

/// The registry of transactions begun by one coordinator.
pub struct TransactionRegistry {
    /// Live and finished transactions.
    maps: Mutex<RegistryMaps>,
    /// Time-to-live given to new transactions.
    ttl: Duration,
    /// Statistics.
    stats: TransactionStats,
    /// Next transaction ID.
    next_txn_id: AtomicU64,
}

impl TransactionRegistry {
    /// Creates a registry whose transactions expire after `ttl` of idleness.
    pub fn new(ttl: Duration) -> Self {
        Self {
            maps: Mutex::new(RegistryMaps::default()),
            ttl,
            stats: TransactionStats::new(),
            next_txn_id: AtomicU64::new(TxnId::MIN.as_u64()),
        }
    }

    /// Begins a new transaction.
    pub fn begin(&self) -> TxnId {
        let txn_id = TxnId::new(self.next_txn_id.fetch_add(1, AtomicOrdering::SeqCst));
        self.maps
            .lock()
            .live
            .insert(txn_id, Transaction::new(txn_id, self.ttl));

        self.stats.started.fetch_add(1, AtomicOrdering::Relaxed);
        self.stats.active.fetch_add(1, AtomicOrdering::Relaxed);
        txn_id
    }

    /// Returns the state of a transaction, if it is known.
    pub fn state(&self, txn_id: TxnId) -> Option<TransactionState> {
        self.maps.lock().state(txn_id)
    }

    /// Returns a snapshot of a live transaction's entry.
    pub fn get(&self, txn_id: TxnId) -> Option<Transaction> {
        self.maps.lock().live.get(&txn_id).cloned()
    }

    /// Returns true if the transaction is active.
    pub fn is_active(&self, txn_id: TxnId) -> bool {
        self.state(txn_id).is_some_and(|s| s.is_active())
    }

    /// Refreshes the last-access instant. Returns false if not active.
    pub fn touch(&self, txn_id: TxnId) -> bool {
        let mut maps = self.maps.lock();
        match maps.active_mut(txn_id) {
            Ok(txn) => {
                txn.last_accessed = Instant::now();
                true
            }
            Err(_) => false,
        }
    }

    /// Checks that a transaction may run an operation, and touches it.
    ///
    /// An active transaction already idle past its TTL is refused as
    /// aborted without being touched; the caller is expected to abort it.
    pub fn validate(&self, txn_id: TxnId) -> TxnResult<()> {
        let mut maps = self.maps.lock();
        let txn = maps.active_mut(txn_id)?;
        let now = Instant::now();
        if txn.is_expired(now) {
            return Err(TxnError::aborted(txn_id, "time-to-live expired"));
        }
        txn.last_accessed = now;
        Ok(())
    }

    /// Enlists a participant. Returns true if it was not enlisted before.
    pub fn enlist(&self, txn_id: TxnId, kind: ResourceKind) -> TxnResult<bool> {
        let mut maps = self.maps.lock();
        let txn = maps.active_mut(txn_id)?;
        txn.last_accessed = Instant::now();
        Ok(txn.participants.insert(kind))
    }

    /// Returns the enlisted participants of a live transaction, in commit order.
    pub fn participants(&self, txn_id: TxnId) -> Vec<ResourceKind> {
        self.maps
            .lock()
            .live
            .get(&txn_id)
            .map(Transaction::participants)
            .unwrap_or_default()
    }

    /// Atomically moves an active transaction into `Committing` or `Aborting`.
    ///
    /// Returns the enlisted participants on success. Fails with the
    /// transaction's taxonomy error if it is no longer active.
    pub fn claim(&self, txn_id: TxnId, target: TransactionState) -> TxnResult<Vec<ResourceKind>> {
        if !matches!(
            target,
            TransactionState::Committing | TransactionState::Aborting
        ) {
            return Err(TxnError::internal(format!(
                "cannot claim {txn_id} for {target}"
            )));
        }

        let mut maps = self.maps.lock();
        let txn = maps.active_mut(txn_id)?;
        txn.state = target;
        Ok(txn.participants())
    }

    /// Records the outcome of a claimed transaction and retires its entry.
    pub fn complete(&self, txn_id: TxnId, outcome: Outcome) {
        let mut maps = self.maps.lock();
        if maps.live.remove(&txn_id).is_some() {
            self.stats.active.fetch_sub(1, AtomicOrdering::Relaxed);
        }
        maps.finished.insert(txn_id, outcome);
        drop(maps);

        match outcome {
            Outcome::Committed => self.stats.committed.fetch_add(1, AtomicOrdering::Relaxed),
            Outcome::Aborted => self.stats.aborted.fetch_add(1, AtomicOrdering::Relaxed),
        };
    }

    /// Lists active transactions idle longer than their TTL at `now`, sorted.
    pub fn expired(&self, now: Instant) -> Vec<TxnId> {
        let mut expired: Vec<TxnId> = self
            .maps
            .lock()
            .live
            .values()
            .filter(|t| t.state.is_active() && t.is_expired(now))
            .map(Transaction::id)
            .collect();
        expired.sort();
        expired
    }

    /// Returns the IDs of all active transactions, sorted.
    pub fn active_ids(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self
            .maps
            .lock()
            .live
            .values()
            .filter(|t| t.state.is_active())
            .map(Transaction::id)
            .collect();
        ids.sort();
        ids
    }

    /// Returns the number of live transactions.
    pub fn active_count(&self) -> usize {
        self.maps.lock().live.len()
    }

    /// Returns the time-to-live given to new transactions.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns statistics.
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }
}

impl fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("active_count", &self.active_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}
