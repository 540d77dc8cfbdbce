//! In-process resource manager.
//!
//! [`ResourceManager`] implements [`Participant`] for one reservable kind on
//! top of a [`ShadowStore`]. Every domain operation reads and writes through
//! the transaction's shadow buffer; nothing reaches the authoritative map
//! before [`Participant::commit`].

use std::fmt;

use tandem_common::error::{TxnError, TxnResult};
use tandem_common::types::{ResourceKind, TxnId};
use tandem_txn::ShadowStore;

use crate::item::ReservableItem;
use crate::participant::Participant;

/// A resource manager owning every item of one kind.
pub struct ResourceManager {
    kind: ResourceKind,
    name: String,
    store: ShadowStore<ReservableItem>,
}

impl ResourceManager {
    /// Creates an empty manager for `kind`, named after it.
    pub fn new(kind: ResourceKind) -> Self {
        Self::with_name(kind, format!("{}s", kind.name()))
    }

    /// Creates an empty manager with an explicit name.
    pub fn with_name(kind: ResourceKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            store: ShadowStore::new(name.clone()),
            name,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &ShadowStore<ReservableItem> {
        &self.store
    }

    /// Reads the committed state of an item outside any transaction.
    pub fn committed(&self, key: &str) -> Option<ReservableItem> {
        self.store.get_committed(key)
    }

    fn check_key(&self, key: &str) -> TxnResult<()> {
        if key.starts_with(self.kind.prefix()) {
            Ok(())
        } else {
            Err(TxnError::invalid_argument(format!(
                "{} does not own key '{key}'",
                self.name
            )))
        }
    }

    fn read_item(&self, txn_id: TxnId, key: &str) -> TxnResult<Option<ReservableItem>> {
        self.check_key(key)?;
        self.store.read(txn_id, key)
    }
}

impl Participant for ResourceManager {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start_transaction(&self, txn_id: TxnId) -> TxnResult<()> {
        if !self.store.is_active(txn_id) {
            tracing::debug!("{}: transaction {} associated", self.name, txn_id);
        }
        self.store.start(txn_id)
    }

    fn commit(&self, txn_id: TxnId) -> TxnResult<bool> {
        let applied = self.store.commit(txn_id)?;
        tracing::info!("{}: committed {} ({} keys)", self.name, txn_id, applied);
        Ok(true)
    }

    fn abort(&self, txn_id: TxnId) -> TxnResult<()> {
        self.store.abort(txn_id)?;
        tracing::info!("{}: aborted {}", self.name, txn_id);
        Ok(())
    }

    fn add_item(
        &self,
        txn_id: TxnId,
        key: &str,
        label: &str,
        count: u32,
        price: u32,
    ) -> TxnResult<bool> {
        let item = match self.read_item(txn_id, key)? {
            Some(mut existing) => {
                existing.restock(count, price);
                tracing::debug!(
                    "{}: {} restocked {} to {} at ${}",
                    self.name,
                    txn_id,
                    key,
                    existing.count,
                    existing.price
                );
                existing
            }
            None => {
                tracing::debug!("{}: {} created {} ({} at ${})", self.name, txn_id, key, count, price);
                ReservableItem::new(key, label, count, price)
            }
        };
        self.store.write(txn_id, key, item)?;
        Ok(true)
    }

    fn delete_item(&self, txn_id: TxnId, key: &str) -> TxnResult<bool> {
        match self.read_item(txn_id, key)? {
            None => {
                tracing::warn!("{}: {} cannot delete {}: no such item", self.name, txn_id, key);
                Ok(false)
            }
            Some(item) if item.reserved > 0 => {
                tracing::info!(
                    "{}: {} cannot delete {}: {} reserved",
                    self.name,
                    txn_id,
                    key,
                    item.reserved
                );
                Ok(false)
            }
            Some(_) => {
                self.store.remove(txn_id, key)?;
                Ok(true)
            }
        }
    }

    fn query_count(&self, txn_id: TxnId, key: &str) -> TxnResult<u32> {
        Ok(self.read_item(txn_id, key)?.map_or(0, |item| item.count))
    }

    fn query_price(&self, txn_id: TxnId, key: &str) -> TxnResult<u32> {
        Ok(self.read_item(txn_id, key)?.map_or(0, |item| item.price))
    }

    fn reserve_item(&self, txn_id: TxnId, key: &str) -> TxnResult<Option<ReservableItem>> {
        let Some(mut item) = self.read_item(txn_id, key)? else {
            tracing::warn!("{}: {} cannot reserve {}: no such item", self.name, txn_id, key);
            return Ok(None);
        };

        if !item.take_one() {
            tracing::warn!("{}: {} cannot reserve {}: none left", self.name, txn_id, key);
            return Ok(None);
        }

        self.store.write(txn_id, key, item.clone())?;
        Ok(Some(item))
    }

    fn release_reservation(&self, txn_id: TxnId, key: &str, count: u32) -> TxnResult<bool> {
        let Some(mut item) = self.read_item(txn_id, key)? else {
            return Ok(false);
        };
        item.give_back(count);
        self.store.write(txn_id, key, item)?;
        Ok(true)
    }

    fn quote(&self, txn_id: TxnId, key: &str, amount: u32) -> TxnResult<Option<u32>> {
        Ok(self
            .read_item(txn_id, key)?
            .filter(|item| item.count >= amount)
            .map(|item| item.price))
    }

    fn list_keys(&self, txn_id: TxnId) -> TxnResult<Vec<String>> {
        self.store.keys_with_prefix(txn_id, self.kind.prefix())
    }

    fn scan(&self, txn_id: TxnId, threshold: u32) -> TxnResult<Vec<ReservableItem>> {
        let mut low = Vec::new();
        for key in self.list_keys(txn_id)? {
            if let Some(item) = self.store.read(txn_id, &key)? {
                if item.count <= threshold {
                    low.push(item);
                }
            }
        }
        Ok(low)
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("store", &self.store)
            .finish()
    }
}
