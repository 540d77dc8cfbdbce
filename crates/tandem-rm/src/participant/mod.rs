//! The participant interface.
//!
//! A participant owns one authoritative domain and keeps its own shadow
//! buffer per transaction. The coordinator drives it through this trait
//! only; participants never see locks, and never talk to each other.
//!
//! Business failures (missing item, nothing left, still reserved) are
//! ordinary return values. `Err` is reserved for transactional failures
//! and participant faults.

use tandem_common::error::TxnResult;
use tandem_common::types::{ResourceKind, TxnId};

use crate::item::ReservableItem;

/// A resource manager enlisted by the coordinator.
pub trait Participant: Send + Sync {
    /// The kind of item this participant owns.
    fn kind(&self) -> ResourceKind;

    /// Name used in logs and in partial-commit reports.
    fn name(&self) -> &str;

    /// Opens the transaction's buffer. Idempotent.
    fn start_transaction(&self, txn_id: TxnId) -> TxnResult<()>;

    /// Applies the transaction's buffer.
    fn commit(&self, txn_id: TxnId) -> TxnResult<bool>;

    /// Discards the transaction's buffer. Safe for a transaction never started here.
    fn abort(&self, txn_id: TxnId) -> TxnResult<()>;

    /// Creates the item, or adds `count` to it and replaces a positive price.
    fn add_item(&self, txn_id: TxnId, key: &str, label: &str, count: u32, price: u32)
        -> TxnResult<bool>;

    /// Deletes the item. Returns false if it is missing or has reservations.
    fn delete_item(&self, txn_id: TxnId, key: &str) -> TxnResult<bool>;

    /// Units available, or 0 if the item is missing.
    fn query_count(&self, txn_id: TxnId, key: &str) -> TxnResult<u32>;

    /// Unit price, or 0 if the item is missing.
    fn query_price(&self, txn_id: TxnId, key: &str) -> TxnResult<u32>;

    /// Reserves one unit. Returns the updated item, or `None` if unavailable.
    fn reserve_item(&self, txn_id: TxnId, key: &str) -> TxnResult<Option<ReservableItem>>;

    /// Returns `count` reserved units to stock. Returns false if the item is missing.
    fn release_reservation(&self, txn_id: TxnId, key: &str, count: u32) -> TxnResult<bool>;

    /// Unit price if at least `amount` units are available.
    fn quote(&self, txn_id: TxnId, key: &str, amount: u32) -> TxnResult<Option<u32>>;

    /// Keys of every item visible to the transaction, sorted.
    fn list_keys(&self, txn_id: TxnId) -> TxnResult<Vec<String>>;

    /// Items visible to the transaction with at most `threshold` units available.
    fn scan(&self, txn_id: TxnId, threshold: u32) -> TxnResult<Vec<ReservableItem>>;
}
