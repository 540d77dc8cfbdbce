//! Fault injection.
//!
//! [`FaultyParticipant`] wraps a real [`ResourceManager`] and fails chosen
//! calls on demand, so tests can drive the coordinator's commit and abort
//! paths through participant faults.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tandem_common::error::{TxnError, TxnResult};
use tandem_common::types::{ResourceKind, TxnId};
use tandem_rm::{Participant, ReservableItem, ResourceManager};

/// A fault to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Behave normally.
    #[default]
    None,
    /// `commit` returns an error and applies nothing.
    CommitError,
    /// `commit` returns `Ok(false)` and applies nothing.
    CommitRefused,
    /// `abort` returns an error after discarding the buffer.
    AbortError,
}

/// A participant that fails on demand.
#[derive(Debug)]
pub struct FaultyParticipant {
    inner: ResourceManager,
    fault: Mutex<Fault>,
    commits: AtomicUsize,
    aborts: AtomicUsize,
}

impl FaultyParticipant {
    /// Wraps a fresh manager for `kind`.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            inner: ResourceManager::new(kind),
            fault: Mutex::new(Fault::None),
            commits: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
        }
    }

    /// Sets the fault injected from now on.
    pub fn inject(&self, fault: Fault) {
        *self.fault.lock() = fault;
    }

    /// Returns the wrapped manager.
    pub fn inner(&self) -> &ResourceManager {
        &self.inner
    }

    /// Number of `commit` calls received.
    pub fn commit_calls(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of `abort` calls received.
    pub fn abort_calls(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    fn fault(&self) -> Fault {
        *self.fault.lock()
    }
}

impl Participant for FaultyParticipant {
    fn kind(&self) -> ResourceKind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn start_transaction(&self, txn_id: TxnId) -> TxnResult<()> {
        self.inner.start_transaction(txn_id)
    }

    fn commit(&self, txn_id: TxnId) -> TxnResult<bool> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        match self.fault() {
            Fault::CommitError => Err(TxnError::fault(self.name(), txn_id, "injected commit failure")),
            Fault::CommitRefused => Ok(false),
            Fault::None | Fault::AbortError => self.inner.commit(txn_id),
        }
    }

    fn abort(&self, txn_id: TxnId) -> TxnResult<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort(txn_id)?;
        if self.fault() == Fault::AbortError {
            return Err(TxnError::fault(self.name(), txn_id, "injected abort failure"));
        }
        Ok(())
    }

    fn add_item(&self, txn_id: TxnId, key: &str, label: &str, count: u32, price: u32) -> TxnResult<bool> {
        self.inner.add_item(txn_id, key, label, count, price)
    }

    fn delete_item(&self, txn_id: TxnId, key: &str) -> TxnResult<bool> {
        self.inner.delete_item(txn_id, key)
    }

    fn query_count(&self, txn_id: TxnId, key: &str) -> TxnResult<u32> {
        self.inner.query_count(txn_id, key)
    }

    fn query_price(&self, txn_id: TxnId, key: &str) -> TxnResult<u32> {
        self.inner.query_price(txn_id, key)
    }

    fn reserve_item(&self, txn_id: TxnId, key: &str) -> TxnResult<Option<ReservableItem>> {
        self.inner.reserve_item(txn_id, key)
    }

    fn release_reservation(&self, txn_id: TxnId, key: &str, count: u32) -> TxnResult<bool> {
        self.inner.release_reservation(txn_id, key, count)
    }

    fn quote(&self, txn_id: TxnId, key: &str, amount: u32) -> TxnResult<Option<u32>> {
        self.inner.quote(txn_id, key, amount)
    }

    fn list_keys(&self, txn_id: TxnId) -> TxnResult<Vec<String>> {
        self.inner.list_keys(txn_id)
    }

    fn scan(&self, txn_id: TxnId, threshold: u32) -> TxnResult<Vec<ReservableItem>> {
        self.inner.scan(txn_id, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_common::types::room_key;

    #[test]
    fn test_commit_error_applies_nothing() {
        let rooms = FaultyParticipant::new(ResourceKind::Room);
        let txn = TxnId::new(1);
        rooms.start_transaction(txn).unwrap();
        rooms.add_item(txn, &room_key("NYC"), "NYC", 5, 100).unwrap();

        rooms.inject(Fault::CommitError);
        assert!(rooms.commit(txn).is_err());
        assert!(rooms.inner().committed(&room_key("NYC")).is_none());
        assert_eq!(rooms.commit_calls(), 1);
    }

    #[test]
    fn test_abort_error_still_discards() {
        let rooms = FaultyParticipant::new(ResourceKind::Room);
        let txn = TxnId::new(1);
        rooms.start_transaction(txn).unwrap();
        rooms.inject(Fault::AbortError);
        assert!(rooms.abort(txn).is_err());
        assert!(!rooms.inner().store().is_active(txn));
    }
}
