//! Shadow-buffered key-value store.
//!
//! A [`ShadowStore`] holds one authoritative map plus one private buffer per
//! active transaction. The first time a transaction touches a key, the
//! current authoritative value (or a tombstone, if absent) is copied into
//! its buffer. Every later read and write of that key by the same
//! transaction goes to the buffer only.
//!
//! ```text
//!              read/write                     commit()
//!   txn 7 ──────────────▶ buffer[7] ──────────────────────┐
//!                            ▲ copy on first touch        ▼
//!                            └──────────────────  authoritative map
//! ```
//!
//! This gives each transaction a private, stable snapshot of every key it
//! has touched. Concurrent commits to those keys are not observed until
//! the transaction ends. Writers are serialized by the lock manager, not
//! by the store.
//!
//! Values are always returned by clone; callers never hold references into
//! store-owned state.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use parking_lot::Mutex;
use tandem_common::error::{TxnError, TxnResult};
use tandem_common::types::TxnId;
use tracing::trace;

use crate::registry::Outcome;

/// A transaction's private view: `None` is a tombstone.
type Buffer<V> = HashMap<String, Option<V>>;

#[derive(Debug)]
struct ShadowTxns<V> {
    active: HashMap<TxnId, Buffer<V>>,
    finished: HashMap<TxnId, Outcome>,
}

impl<V> Default for ShadowTxns<V> {
    fn default() -> Self {
        Self {
            active: HashMap::new(),
            finished: HashMap::new(),
        }
    }
}

impl<V> ShadowTxns<V> {
    fn buffer_mut(&mut self, store: &str, txn_id: TxnId) -> TxnResult<&mut Buffer<V>> {
        if let Some(outcome) = self.finished.get(&txn_id) {
            return Err(outcome.to_error(txn_id));
        }
        self.active
            .get_mut(&txn_id)
            .ok_or_else(|| TxnError::invalid(txn_id, format!("not started in {store}")))
    }
}

/// A key-value store with per-transaction shadow buffers.
pub struct ShadowStore<V> {
    /// Name used in errors and logs.
    name: String,
    /// Authoritative committed state.
    store: Mutex<HashMap<String, V>>,
    /// Buffers of active transactions and outcomes of finished ones.
    txns: Mutex<ShadowTxns<V>>,
}

impl<V: Clone> ShadowStore<V> {
    /// Creates an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: Mutex::new(HashMap::new()),
            txns: Mutex::new(ShadowTxns::default()),
        }
    }

    /// Returns the store's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a buffer for a transaction. Idempotent while it is active.
    pub fn start(&self, txn_id: TxnId) -> TxnResult<()> {
        let mut txns = self.txns.lock();
        if let Some(outcome) = txns.finished.get(&txn_id) {
            return Err(outcome.to_error(txn_id));
        }
        txns.active.entry(txn_id).or_default();
        Ok(())
    }

    /// Returns true if the transaction has an open buffer.
    pub fn is_active(&self, txn_id: TxnId) -> bool {
        self.txns.lock().active.contains_key(&txn_id)
    }

    /// Returns how the transaction ended here, if it has.
    pub fn outcome(&self, txn_id: TxnId) -> Option<Outcome> {
        self.txns.lock().finished.get(&txn_id).copied()
    }

    /// Reads a key as the transaction sees it.
    pub fn read(&self, txn_id: TxnId, key: &str) -> TxnResult<Option<V>> {
        let mut txns = self.txns.lock();
        let buffer = txns.buffer_mut(&self.name, txn_id)?;
        Ok(self.materialize(buffer, key).clone())
    }

    /// Writes a key in the transaction's buffer.
    pub fn write(&self, txn_id: TxnId, key: &str, value: V) -> TxnResult<()> {
        self.put(txn_id, key, Some(value))
    }

    /// Deletes a key in the transaction's buffer.
    pub fn remove(&self, txn_id: TxnId, key: &str) -> TxnResult<()> {
        self.put(txn_id, key, None)
    }

    fn put(&self, txn_id: TxnId, key: &str, value: Option<V>) -> TxnResult<()> {
        let mut txns = self.txns.lock();
        let buffer = txns.buffer_mut(&self.name, txn_id)?;
        *self.materialize(buffer, key) = value;
        Ok(())
    }

    /// Returns the buffered entry for `key`, copying it in on first touch.
    fn materialize<'a>(&self, buffer: &'a mut Buffer<V>, key: &str) -> &'a mut Option<V> {
        buffer
            .entry(key.to_string())
            .or_insert_with(|| self.store.lock().get(key).cloned())
    }

    /// Lists the keys with `prefix` that the transaction can see, sorted.
    ///
    /// This is the union of committed keys and keys buffered by the
    /// transaction, minus its tombstones. Listing does not copy anything
    /// into the buffer.
    pub fn keys_with_prefix(&self, txn_id: TxnId, prefix: &str) -> TxnResult<Vec<String>> {
        let mut txns = self.txns.lock();
        let buffer = txns.buffer_mut(&self.name, txn_id)?;

        let mut keys: BTreeSet<String> = self
            .store
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        for (key, value) in buffer.iter().filter(|(k, _)| k.starts_with(prefix)) {
            if value.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }

        Ok(keys.into_iter().collect())
    }

    /// Applies the transaction's buffer to the authoritative map.
    ///
    /// Returns the number of entries applied.
    pub fn commit(&self, txn_id: TxnId) -> TxnResult<usize> {
        let mut txns = self.txns.lock();
        txns.buffer_mut(&self.name, txn_id)?;
        let buffer = txns.active.remove(&txn_id).unwrap_or_default();
        let applied = buffer.len();

        {
            let mut store = self.store.lock();
            for (key, value) in buffer {
                match value {
                    Some(value) => {
                        store.insert(key, value);
                    }
                    None => {
                        store.remove(&key);
                    }
                }
            }
        }

        txns.finished.insert(txn_id, Outcome::Committed);
        trace!(store = %self.name, txn_id = %txn_id, applied, "shadow buffer committed");
        Ok(applied)
    }

    /// Discards the transaction's buffer.
    ///
    /// Aborting a transaction that never started here still records it as
    /// aborted, so a late `start` is refused. Aborting twice is a no-op.
    pub fn abort(&self, txn_id: TxnId) -> TxnResult<()> {
        let mut txns = self.txns.lock();
        if let Some(Outcome::Committed) = txns.finished.get(&txn_id) {
            return Err(Outcome::Committed.to_error(txn_id));
        }
        let discarded = txns.active.remove(&txn_id).map_or(0, |b| b.len());
        txns.finished.insert(txn_id, Outcome::Aborted);
        trace!(store = %self.name, txn_id = %txn_id, discarded, "shadow buffer discarded");
        Ok(())
    }

    /// Reads the committed value of a key outside any transaction.
    pub fn get_committed(&self, key: &str) -> Option<V> {
        self.store.lock().get(key).cloned()
    }

    /// Returns every committed entry, sorted by key.
    pub fn committed_entries(&self) -> Vec<(String, V)> {
        let mut entries: Vec<(String, V)> = self
            .store
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Returns the number of committed keys.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Returns true if nothing is committed.
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Returns the number of open buffers.
    pub fn active_count(&self) -> usize {
        self.txns.lock().active.len()
    }
}

impl<V> fmt::Debug for ShadowStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowStore")
            .field("name", &self.name)
            .field("committed_keys", &self.store.lock().len())
            .field("active_txns", &self.txns.lock().active.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: u64) -> TxnId {
        TxnId::new(id)
    }

    fn store_with(entries: &[(&str, u32)]) -> ShadowStore<u32> {
        let store = ShadowStore::new("test");
        store.start(t(100)).unwrap();
        for (k, v) in entries {
            store.write(t(100), k, *v).unwrap();
        }
        store.commit(t(100)).unwrap();
        store
    }

    #[test]
    fn test_read_your_own_writes() {
        let store = ShadowStore::new("test");
        store.start(t(1)).unwrap();

        store.write(t(1), "room-nyc", 5u32).unwrap();
        assert_eq!(store.read(t(1), "room-nyc").unwrap(), Some(5));
        assert_eq!(store.get_committed("room-nyc"), None);

        store.commit(t(1)).unwrap();
        assert_eq!(store.get_committed("room-nyc"), Some(5));
    }

    #[test]
    fn test_abort_leaves_store_untouched() {
        let store = store_with(&[("a", 1), ("b", 2)]);
        let before = store.committed_entries();

        store.start(t(1)).unwrap();
        store.write(t(1), "a", 10).unwrap();
        store.remove(t(1), "b").unwrap();
        store.write(t(1), "c", 3).unwrap();
        store.abort(t(1)).unwrap();

        assert_eq!(store.committed_entries(), before);
        assert_eq!(store.outcome(t(1)), Some(Outcome::Aborted));
    }

    #[test]
    fn test_snapshot_stable_after_first_touch() {
        let store = store_with(&[("room-nyc", 5)]);

        store.start(t(2)).unwrap();
        store.start(t(3)).unwrap();
        assert_eq!(store.read(t(3), "room-nyc").unwrap(), Some(5));

        store.write(t(2), "room-nyc", 4).unwrap();
        store.commit(t(2)).unwrap();

        // t3 copied the key before t2 committed
        assert_eq!(store.read(t(3), "room-nyc").unwrap(), Some(5));

        store.start(t(4)).unwrap();
        assert_eq!(store.read(t(4), "room-nyc").unwrap(), Some(4));
    }

    #[test]
    fn test_tombstones_commit_as_deletes() {
        let store = store_with(&[("car-sfo", 7)]);

        store.start(t(1)).unwrap();
        store.remove(t(1), "car-sfo").unwrap();
        assert_eq!(store.read(t(1), "car-sfo").unwrap(), None);
        assert_eq!(store.get_committed("car-sfo"), Some(7));

        assert_eq!(store.commit(t(1)).unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = store_with(&[("room-nyc", 1), ("room-sfo", 2), ("car-nyc", 3)]);

        store.start(t(1)).unwrap();
        store.remove(t(1), "room-sfo").unwrap();
        store.write(t(1), "room-bos", 4).unwrap();

        assert_eq!(
            store.keys_with_prefix(t(1), "room-").unwrap(),
            vec!["room-bos".to_string(), "room-nyc".to_string()]
        );

        store.start(t(2)).unwrap();
        assert_eq!(
            store.keys_with_prefix(t(2), "room-").unwrap(),
            vec!["room-nyc".to_string(), "room-sfo".to_string()]
        );
    }

    #[test]
    fn test_error_taxonomy() {
        let store: ShadowStore<u32> = ShadowStore::new("test");

        assert!(store.read(t(9), "k").unwrap_err().is_invalid_transaction());

        store.start(t(1)).unwrap();
        store.commit(t(1)).unwrap();
        assert!(store.read(t(1), "k").unwrap_err().is_invalid_transaction());
        assert!(store.start(t(1)).unwrap_err().is_invalid_transaction());
        assert!(store.abort(t(1)).unwrap_err().is_invalid_transaction());

        store.start(t(2)).unwrap();
        store.abort(t(2)).unwrap();
        assert!(store.write(t(2), "k", 1).unwrap_err().is_aborted());
        assert!(store.commit(t(2)).unwrap_err().is_aborted());
    }

    #[test]
    fn test_abort_unknown_blocks_late_start() {
        let store: ShadowStore<u32> = ShadowStore::new("test");

        store.abort(t(5)).unwrap();
        store.abort(t(5)).unwrap();
        assert!(store.start(t(5)).unwrap_err().is_aborted());
    }

    #[test]
    fn test_start_is_idempotent() {
        let store = ShadowStore::new("test");
        store.start(t(1)).unwrap();
        store.write(t(1), "k", 1u32).unwrap();
        store.start(t(1)).unwrap();
        assert_eq!(store.read(t(1), "k").unwrap(), Some(1));
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_returned_values_are_copies() {
        let other: ShadowStore<Vec<u32>> = ShadowStore::new("vec");
        other.start(t(1)).unwrap();
        other.write(t(1), "list", vec![1]).unwrap();

        let mut copy = other.read(t(1), "list").unwrap().unwrap();
        copy.push(2);
        assert_eq!(other.read(t(1), "list").unwrap(), Some(vec![1]));
    }
}
