//! The transaction coordinator.
//!
//! The coordinator exposes the travel-reservation operations. Each one runs
//! in the same steps:
//!
//! 1. validate the xid (and touch it)
//! 2. acquire every lock it needs, in canonical order: the customer key
//!    first, then item keys sorted
//! 3. re-check that the xid is still active after the locks were granted
//! 4. enlist the owning participant on first use and start the xid there
//! 5. delegate to the participant
//! 6. fold the result into the coordinator's own customer store
//!
//! Commit visits every enlisted participant in [`ResourceKind`] order and
//! then applies the customer buffer. There is no prepare phase: when a
//! participant fails to commit, the participants after it are aborted, the
//! customer buffer is discarded and the caller gets
//! [`TxnError::PartialCommit`] naming the participants that did commit.
//!
//! Whoever wins [`TransactionRegistry::claim`] finishes the transaction.
//! Finishing records the outcome before releasing locks, so a lock granted
//! to a late operation is either released by the finisher or noticed by the
//! late operation's re-check.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tandem_common::config::CoordinatorConfig;
use tandem_common::constants::{CUSTOMER_ID_ATTEMPTS, CUSTOMER_ID_SUFFIX_RANGE};
use tandem_common::error::{TxnError, TxnResult};
use tandem_common::types::{
    car_key, customer_key, flight_key, room_key, CustomerId, ResourceKind, TxnId,
};
use tandem_rm::{Customer, Participant, ReservableItem};
use tandem_txn::{
    LockError, LockManager, LockManagerConfig, LockMode, Outcome, ShadowStore,
    TransactionRegistry, TransactionState,
};

use crate::participants::ParticipantRegistry;

/// Statistics about the coordinator.
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    /// Transactions aborted because they closed a deadlock.
    pub deadlock_aborts: AtomicU64,
    /// Transactions aborted by the TTL reaper.
    pub reaped: AtomicU64,
    /// Commits that failed after at least one participant committed.
    pub partial_commits: AtomicU64,
}

/// Drives transactions across the registered participants.
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: TransactionRegistry,
    locks: LockManager,
    customers: ShadowStore<Customer>,
    participants: ParticipantRegistry,
    stats: CoordinatorStats,
}

impl Coordinator {
    /// Creates a coordinator over `participants`.
    pub fn new(config: CoordinatorConfig, participants: ParticipantRegistry) -> TxnResult<Self> {
        config.validate().map_err(TxnError::invalid_argument)?;

        Ok(Self {
            registry: TransactionRegistry::new(config.txn_ttl()),
            locks: LockManager::with_config(LockManagerConfig::from(&config)),
            customers: ShadowStore::new("customers"),
            participants,
            stats: CoordinatorStats::default(),
            config,
        })
    }

    /// Creates a coordinator with one in-process resource manager per kind.
    pub fn in_process(config: CoordinatorConfig) -> TxnResult<Self> {
        Self::new(config, ParticipantRegistry::in_process())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Begins a transaction.
    pub fn start(&self) -> TxnResult<TxnId> {
        let txn_id = self.registry.begin();
        self.customers.start(txn_id)?;
        tracing::info!("Started transaction {}", txn_id);
        Ok(txn_id)
    }

    /// Commits a transaction on every enlisted participant, then locally.
    pub fn commit(&self, txn_id: TxnId) -> TxnResult<bool> {
        let kinds = self.registry.claim(txn_id, TransactionState::Committing)?;

        let mut committed: Vec<String> = Vec::new();
        for (index, kind) in kinds.iter().enumerate() {
            let participant = match self.participants.get(*kind) {
                Ok(participant) => participant,
                Err(err) => {
                    return Err(self.fail_commit(txn_id, &kinds[index..], committed, kind.name(), err));
                }
            };

            match participant.commit(txn_id) {
                Ok(true) => committed.push(participant.name().to_string()),
                Ok(false) => {
                    let err = TxnError::fault(participant.name(), txn_id, "commit refused");
                    return Err(self.fail_commit(txn_id, &kinds[index..], committed, participant.name(), err));
                }
                Err(err) => {
                    return Err(self.fail_commit(txn_id, &kinds[index..], committed, participant.name(), err));
                }
            }
        }

        if let Err(err) = self.customers.commit(txn_id) {
            return Err(self.fail_commit(txn_id, &[], committed, "customers", err));
        }
        self.finish(txn_id, Outcome::Committed);
        tracing::info!("Committed transaction {} ({} participants)", txn_id, committed.len());
        Ok(true)
    }

    /// Aborts a transaction on every enlisted participant, then locally.
    pub fn abort(&self, txn_id: TxnId) -> TxnResult<()> {
        self.abort_with_reason(txn_id, "client request")
    }

    fn abort_with_reason(&self, txn_id: TxnId, reason: &str) -> TxnResult<()> {
        let kinds = self.registry.claim(txn_id, TransactionState::Aborting)?;
        self.abort_participants(txn_id, &kinds);
        if let Err(err) = self.customers.abort(txn_id) {
            tracing::warn!("Customer store failed to abort {}: {}", txn_id, err);
        }
        self.finish(txn_id, Outcome::Aborted);
        tracing::info!("Aborted transaction {} ({})", txn_id, reason);
        Ok(())
    }

    /// Aborts every expired transaction. Returns the ones this call aborted.
    pub fn reap_expired(&self) -> Vec<TxnId> {
        let mut reaped = Vec::new();
        for txn_id in self.registry.expired(Instant::now()) {
            if self.abort_with_reason(txn_id, "time-to-live expired").is_ok() {
                self.stats.reaped.fetch_add(1, AtomicOrdering::Relaxed);
                tracing::warn!("Reaped idle transaction {}", txn_id);
                reaped.push(txn_id);
            }
        }
        reaped
    }

    fn abort_participants(&self, txn_id: TxnId, kinds: &[ResourceKind]) {
        for kind in kinds {
            match self.participants.get(*kind) {
                Ok(participant) => {
                    if let Err(err) = participant.abort(txn_id) {
                        tracing::warn!(
                            "Participant {} failed to abort {}: {}",
                            participant.name(),
                            txn_id,
                            err
                        );
                    }
                }
                Err(err) => tracing::warn!("Cannot abort {} on {}: {}", txn_id, kind, err),
            }
        }
    }

    /// Handles a participant (or the customer store) that failed to commit.
    /// `remaining` starts at the failed participant.
    fn fail_commit(
        &self,
        txn_id: TxnId,
        remaining: &[ResourceKind],
        committed: Vec<String>,
        failed: &str,
        cause: TxnError,
    ) -> TxnError {
        tracing::error!(
            "Participant {} failed to commit {} after {:?}: {}",
            failed,
            txn_id,
            committed,
            cause
        );

        self.abort_participants(txn_id, remaining);
        if let Err(err) = self.customers.abort(txn_id) {
            tracing::warn!("Customer store failed to abort {}: {}", txn_id, err);
        }
        self.finish(txn_id, Outcome::Aborted);

        if committed.is_empty() {
            TxnError::aborted(txn_id, format!("{failed} failed to commit: {cause}"))
        } else {
            self.stats.partial_commits.fetch_add(1, AtomicOrdering::Relaxed);
            TxnError::PartialCommit {
                txn_id,
                committed,
                failed: failed.to_string(),
                message: cause.to_string(),
            }
        }
    }

    fn finish(&self, txn_id: TxnId, outcome: Outcome) {
        self.registry.complete(txn_id, outcome);
        self.locks.release(txn_id);
    }

    // =========================================================================
    // Operation plumbing
    // =========================================================================

    /// Checks the xid, aborting it first if it has outlived its TTL.
    fn validate(&self, txn_id: TxnId) -> TxnResult<()> {
        let result = self.registry.validate(txn_id);
        if let Err(err) = &result {
            if err.is_aborted() && self.registry.is_active(txn_id) {
                let _ = self.abort_with_reason(txn_id, "time-to-live expired");
            }
        }
        result
    }

    fn lock(&self, txn_id: TxnId, key: &str, mode: LockMode) -> TxnResult<()> {
        match self.locks.acquire(txn_id, key, mode) {
            Ok(_) => {
                // A finisher that completed before this grant has already
                // released, so nobody else will drop this lock.
                if self.registry.state(txn_id).is_some_and(|s| s.is_ended()) {
                    self.locks.release(txn_id);
                    tracing::debug!("Dropped {} granted to finished {}", key, txn_id);
                    self.registry.validate(txn_id)?;
                    return Err(TxnError::aborted(txn_id, format!("finished while locking {key}")));
                }
                Ok(())
            }
            Err(LockError::Deadlock { cycle, .. }) => {
                self.stats.deadlock_aborts.fetch_add(1, AtomicOrdering::Relaxed);
                tracing::warn!(
                    "Deadlock on {} for {} (cycle {:?}), aborting",
                    key,
                    txn_id,
                    cycle
                );
                let _ = self.abort_with_reason(txn_id, "deadlock");
                Err(TxnError::aborted(txn_id, format!("deadlock detected on {key}")))
            }
            Err(LockError::Cancelled { .. }) => {
                Err(TxnError::aborted(txn_id, format!("lock wait on {key} cancelled")))
            }
        }
    }

    /// Re-checks the xid after its locks were granted.
    fn ensure_live(&self, txn_id: TxnId) -> TxnResult<()> {
        if let Err(err) = self.validate(txn_id) {
            if self.registry.state(txn_id).is_some_and(|s| s.is_ended()) {
                self.locks.release(txn_id);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Validates, locks `keys` in the given order, and re-checks.
    fn prepare(&self, txn_id: TxnId, keys: &[(&str, LockMode)]) -> TxnResult<()> {
        self.validate(txn_id)?;
        for (key, mode) in keys {
            self.lock(txn_id, key, *mode)?;
        }
        self.ensure_live(txn_id)
    }

    /// Returns the participant owning `kind`, enlisting it on first use.
    fn enlist(&self, txn_id: TxnId, kind: ResourceKind) -> TxnResult<Arc<dyn Participant>> {
        let participant = self.participants.get(kind)?;
        if self.registry.enlist(txn_id, kind)? {
            tracing::debug!("Enlisted {} in {}", participant.name(), txn_id);
            participant.start_transaction(txn_id)?;
        }
        Ok(participant)
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// Adds seats to a flight, creating it if needed.
    pub fn add_flight(&self, txn_id: TxnId, number: u32, seats: u32, price: u32) -> TxnResult<bool> {
        self.add_item(txn_id, ResourceKind::Flight, &flight_key(number), &number.to_string(), seats, price)
    }

    /// Adds cars at a location, creating the location if needed.
    pub fn add_cars(&self, txn_id: TxnId, location: &str, count: u32, price: u32) -> TxnResult<bool> {
        self.add_item(txn_id, ResourceKind::Car, &car_key(location), location, count, price)
    }

    /// Adds rooms at a location, creating the location if needed.
    pub fn add_rooms(&self, txn_id: TxnId, location: &str, count: u32, price: u32) -> TxnResult<bool> {
        self.add_item(txn_id, ResourceKind::Room, &room_key(location), location, count, price)
    }

    fn add_item(
        &self,
        txn_id: TxnId,
        kind: ResourceKind,
        key: &str,
        label: &str,
        count: u32,
        price: u32,
    ) -> TxnResult<bool> {
        self.prepare(txn_id, &[(key, LockMode::Write)])?;
        self.enlist(txn_id, kind)?.add_item(txn_id, key, label, count, price)
    }

    /// Deletes a flight. Fails softly if it is missing or has reservations.
    pub fn delete_flight(&self, txn_id: TxnId, number: u32) -> TxnResult<bool> {
        self.delete_item(txn_id, ResourceKind::Flight, &flight_key(number))
    }

    /// Deletes the cars at a location.
    pub fn delete_cars(&self, txn_id: TxnId, location: &str) -> TxnResult<bool> {
        self.delete_item(txn_id, ResourceKind::Car, &car_key(location))
    }

    /// Deletes the rooms at a location.
    pub fn delete_rooms(&self, txn_id: TxnId, location: &str) -> TxnResult<bool> {
        self.delete_item(txn_id, ResourceKind::Room, &room_key(location))
    }

    fn delete_item(&self, txn_id: TxnId, kind: ResourceKind, key: &str) -> TxnResult<bool> {
        self.prepare(txn_id, &[(key, LockMode::Write)])?;
        self.enlist(txn_id, kind)?.delete_item(txn_id, key)
    }

    /// Seats available on a flight.
    pub fn query_flight(&self, txn_id: TxnId, number: u32) -> TxnResult<u32> {
        self.query_count(txn_id, ResourceKind::Flight, &flight_key(number))
    }

    /// Cars available at a location.
    pub fn query_cars(&self, txn_id: TxnId, location: &str) -> TxnResult<u32> {
        self.query_count(txn_id, ResourceKind::Car, &car_key(location))
    }

    /// Rooms available at a location.
    pub fn query_rooms(&self, txn_id: TxnId, location: &str) -> TxnResult<u32> {
        self.query_count(txn_id, ResourceKind::Room, &room_key(location))
    }

    fn query_count(&self, txn_id: TxnId, kind: ResourceKind, key: &str) -> TxnResult<u32> {
        self.prepare(txn_id, &[(key, LockMode::Read)])?;
        self.enlist(txn_id, kind)?.query_count(txn_id, key)
    }

    /// Seat price of a flight.
    pub fn query_flight_price(&self, txn_id: TxnId, number: u32) -> TxnResult<u32> {
        self.query_price(txn_id, ResourceKind::Flight, &flight_key(number))
    }

    /// Car price at a location.
    pub fn query_cars_price(&self, txn_id: TxnId, location: &str) -> TxnResult<u32> {
        self.query_price(txn_id, ResourceKind::Car, &car_key(location))
    }

    /// Room price at a location.
    pub fn query_rooms_price(&self, txn_id: TxnId, location: &str) -> TxnResult<u32> {
        self.query_price(txn_id, ResourceKind::Room, &room_key(location))
    }

    fn query_price(&self, txn_id: TxnId, kind: ResourceKind, key: &str) -> TxnResult<u32> {
        self.prepare(txn_id, &[(key, LockMode::Read)])?;
        self.enlist(txn_id, kind)?.query_price(txn_id, key)
    }

    /// Items of `kind` with at most `threshold` units left, in key order.
    pub fn low_stock(
        &self,
        txn_id: TxnId,
        kind: ResourceKind,
        threshold: u32,
    ) -> TxnResult<Vec<ReservableItem>> {
        if !kind.is_reservable() {
            return Err(TxnError::invalid_argument(format!("{kind} has no stock")));
        }

        self.validate(txn_id)?;
        let participant = self.enlist(txn_id, kind)?;
        for key in participant.list_keys(txn_id)? {
            self.lock(txn_id, &key, LockMode::Read)?;
        }
        self.ensure_live(txn_id)?;
        participant.scan(txn_id, threshold)
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Creates a customer with a generated ID.
    pub fn new_customer(&self, txn_id: TxnId) -> TxnResult<CustomerId> {
        self.validate(txn_id)?;
        let base = (txn_id.as_u64() % 1_000_000) as u32 * CUSTOMER_ID_SUFFIX_RANGE;

        for _ in 0..CUSTOMER_ID_ATTEMPTS {
            let id = CustomerId::new(base + rand::thread_rng().gen_range(0..CUSTOMER_ID_SUFFIX_RANGE));
            if self.new_customer_with_id(txn_id, id)? {
                return Ok(id);
            }
        }

        Err(TxnError::internal(format!(
            "no free customer id after {CUSTOMER_ID_ATTEMPTS} attempts"
        )))
    }

    /// Creates a customer with a chosen ID. Returns false if it already exists.
    pub fn new_customer_with_id(&self, txn_id: TxnId, id: CustomerId) -> TxnResult<bool> {
        let key = customer_key(id);
        self.prepare(txn_id, &[(key.as_str(), LockMode::Write)])?;

        if self.customers.read(txn_id, &key)?.is_some() {
            tracing::info!("Customer {} already exists ({})", id, txn_id);
            return Ok(false);
        }
        self.customers.write(txn_id, &key, Customer::new(id))?;
        tracing::debug!("Created customer {} in {}", id, txn_id);
        Ok(true)
    }

    /// Deletes a customer and returns everything they reserved to stock.
    pub fn delete_customer(&self, txn_id: TxnId, id: CustomerId) -> TxnResult<bool> {
        let key = customer_key(id);
        self.validate(txn_id)?;
        self.lock(txn_id, &key, LockMode::Write)?;
        self.ensure_live(txn_id)?;

        let Some(customer) = self.customers.read(txn_id, &key)? else {
            tracing::warn!("Cannot delete customer {}: no such customer ({})", id, txn_id);
            return Ok(false);
        };

        for reservation in customer.reservations() {
            self.lock(txn_id, &reservation.key, LockMode::Write)?;
        }
        self.ensure_live(txn_id)?;

        for reservation in customer.reservations() {
            let kind = ResourceKind::of_key(&reservation.key).ok_or_else(|| {
                TxnError::internal(format!("reservation of unknown key '{}'", reservation.key))
            })?;
            self.enlist(txn_id, kind)?
                .release_reservation(txn_id, &reservation.key, reservation.count)?;
        }

        self.customers.remove(txn_id, &key)?;
        tracing::info!("Deleted customer {} in {}", id, txn_id);
        Ok(true)
    }

    /// The customer's bill, or an empty string if there is no such customer.
    pub fn query_customer_info(&self, txn_id: TxnId, id: CustomerId) -> TxnResult<String> {
        let key = customer_key(id);
        self.prepare(txn_id, &[(key.as_str(), LockMode::Read)])?;
        Ok(self
            .customers
            .read(txn_id, &key)?
            .map(|customer| customer.bill())
            .unwrap_or_default())
    }

    /// Every customer with their reservations, in key order.
    ///
    /// Read-locks each customer visible to the transaction.
    pub fn summary(&self, txn_id: TxnId) -> TxnResult<Vec<Customer>> {
        self.validate(txn_id)?;
        let keys = self
            .customers
            .keys_with_prefix(txn_id, ResourceKind::Customer.prefix())?;
        for key in &keys {
            self.lock(txn_id, key, LockMode::Read)?;
        }
        self.ensure_live(txn_id)?;

        let mut customers = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(customer) = self.customers.read(txn_id, key)? {
                customers.push(customer);
            }
        }
        Ok(customers)
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Reserves a seat on a flight for a customer.
    pub fn reserve_flight(&self, txn_id: TxnId, customer: CustomerId, number: u32) -> TxnResult<bool> {
        self.reserve(txn_id, customer, ResourceKind::Flight, &flight_key(number))
    }

    /// Reserves a car at a location for a customer.
    pub fn reserve_car(&self, txn_id: TxnId, customer: CustomerId, location: &str) -> TxnResult<bool> {
        self.reserve(txn_id, customer, ResourceKind::Car, &car_key(location))
    }

    /// Reserves a room at a location for a customer.
    pub fn reserve_room(&self, txn_id: TxnId, customer: CustomerId, location: &str) -> TxnResult<bool> {
        self.reserve(txn_id, customer, ResourceKind::Room, &room_key(location))
    }

    fn reserve(&self, txn_id: TxnId, id: CustomerId, kind: ResourceKind, key: &str) -> TxnResult<bool> {
        let ckey = customer_key(id);
        self.prepare(txn_id, &[(ckey.as_str(), LockMode::Write), (key, LockMode::Write)])?;

        let Some(mut customer) = self.customers.read(txn_id, &ckey)? else {
            tracing::warn!("Cannot reserve {} for customer {}: no such customer", key, id);
            return Ok(false);
        };

        let Some(item) = self.enlist(txn_id, kind)?.reserve_item(txn_id, key)? else {
            return Ok(false);
        };

        customer.reserve(key, &item.label, item.price);
        self.customers.write(txn_id, &ckey, customer)?;
        tracing::debug!("Reserved {} for customer {} in {}", key, id, txn_id);
        Ok(true)
    }

    /// Reserves flights, and optionally a car and a room at `location`, all or nothing.
    ///
    /// Repeated flight numbers request several seats. Every item is checked
    /// before anything is reserved, so a failed check reserves nothing.
    pub fn bundle(
        &self,
        txn_id: TxnId,
        id: CustomerId,
        flights: &[u32],
        location: &str,
        car: bool,
        room: bool,
    ) -> TxnResult<bool> {
        let mut demand: BTreeMap<String, (ResourceKind, u32)> = BTreeMap::new();
        for number in flights {
            demand
                .entry(flight_key(*number))
                .or_insert((ResourceKind::Flight, 0))
                .1 += 1;
        }
        if car {
            demand.insert(car_key(location), (ResourceKind::Car, 1));
        }
        if room {
            demand.insert(room_key(location), (ResourceKind::Room, 1));
        }

        let ckey = customer_key(id);
        let mut keys: Vec<(&str, LockMode)> = vec![(ckey.as_str(), LockMode::Write)];
        keys.extend(demand.keys().map(|key| (key.as_str(), LockMode::Write)));
        self.prepare(txn_id, &keys)?;

        let Some(mut customer) = self.customers.read(txn_id, &ckey)? else {
            tracing::warn!("Bundle for customer {} failed: no such customer", id);
            return Ok(false);
        };

        let mut owners = Vec::with_capacity(demand.len());
        for (key, (kind, amount)) in &demand {
            let participant = self.enlist(txn_id, *kind)?;
            if participant.quote(txn_id, key, *amount)?.is_none() {
                tracing::info!("Bundle for customer {} failed: {} x{} unavailable", id, key, amount);
                return Ok(false);
            }
            owners.push((key, *amount, participant));
        }

        for (key, amount, participant) in owners {
            for _ in 0..amount {
                let item = participant.reserve_item(txn_id, key)?.ok_or_else(|| {
                    TxnError::internal(format!("{key} vanished under a write lock"))
                })?;
                customer.reserve(key, &item.label, item.price);
            }
        }

        self.customers.write(txn_id, &ckey, customer)?;
        tracing::info!("Bundle reserved {} items for customer {} in {}", demand.len(), id, txn_id);
        Ok(true)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns the configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the transaction registry.
    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Returns the lock manager.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Returns the registered participants.
    pub fn participants(&self) -> &ParticipantRegistry {
        &self.participants
    }

    /// Returns the committed record of a customer.
    pub fn committed_customer(&self, id: CustomerId) -> Option<Customer> {
        self.customers.get_committed(&customer_key(id))
    }

    /// Returns statistics.
    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("locks", &self.locks)
            .field("participants", &self.participants)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> Coordinator {
        Coordinator::in_process(CoordinatorConfig::for_testing()).unwrap()
    }

    fn seeded() -> (Coordinator, CustomerId) {
        let c = coordinator();
        let txn = c.start().unwrap();
        c.add_rooms(txn, "NYC", 5, 100).unwrap();
        c.add_cars(txn, "NYC", 2, 50).unwrap();
        c.add_flight(txn, 12, 3, 300).unwrap();
        let id = CustomerId::new(7);
        assert!(c.new_customer_with_id(txn, id).unwrap());
        assert!(c.commit(txn).unwrap());
        (c, id)
    }

    #[test]
    fn test_start_allocates_increasing_ids() {
        let c = coordinator();
        assert_eq!(c.start().unwrap(), TxnId::new(1));
        assert_eq!(c.start().unwrap(), TxnId::new(2));
    }

    #[test]
    fn test_add_query_commit() {
        let (c, _) = seeded();
        let txn = c.start().unwrap();
        assert_eq!(c.query_rooms(txn, "nyc").unwrap(), 5);
        assert_eq!(c.query_rooms_price(txn, "NYC").unwrap(), 100);
        assert_eq!(c.query_flight(txn, 12).unwrap(), 3);
        assert_eq!(c.query_cars(txn, "SFO").unwrap(), 0);
        c.commit(txn).unwrap();
        assert!(c.locks().locks_held(txn).is_empty());
    }

    #[test]
    fn test_reserve_updates_item_and_customer() {
        let (c, id) = seeded();
        let txn = c.start().unwrap();
        assert!(c.reserve_room(txn, id, "NYC").unwrap());
        assert_eq!(c.query_rooms(txn, "NYC").unwrap(), 4);
        c.commit(txn).unwrap();

        let customer = c.committed_customer(id).unwrap();
        assert_eq!(customer.reservation("room-nyc").unwrap().count, 1);

        let txn = c.start().unwrap();
        assert_eq!(
            c.query_customer_info(txn, id).unwrap(),
            "Bill for customer 7\n1 room-nyc $100\n"
        );
    }

    #[test]
    fn test_reserve_without_stock_is_soft_failure() {
        let (c, _) = seeded();
        let txn = c.start().unwrap();
        let other = CustomerId::new(1);
        c.new_customer_with_id(txn, other).unwrap();

        assert!(!c.reserve_room(txn, other, "BOS").unwrap());
        assert!(!c.reserve_room(txn, CustomerId::new(99), "NYC").unwrap());
        c.commit(txn).unwrap();
        assert_eq!(c.committed_customer(other).unwrap().reserved_units(), 0);
    }

    #[test]
    fn test_new_customer_generates_unused_id() {
        let c = coordinator();
        let txn = c.start().unwrap();
        let a = c.new_customer(txn).unwrap();
        let b = c.new_customer(txn).unwrap();
        assert_ne!(a, b);
        assert!(!c.new_customer_with_id(txn, a).unwrap());
    }

    #[test]
    fn test_delete_customer_restores_stock() {
        let (c, id) = seeded();
        let txn = c.start().unwrap();
        c.reserve_room(txn, id, "NYC").unwrap();
        c.reserve_flight(txn, id, 12).unwrap();
        c.reserve_flight(txn, id, 12).unwrap();
        c.commit(txn).unwrap();

        let txn = c.start().unwrap();
        assert!(c.delete_customer(txn, id).unwrap());
        assert_eq!(c.query_flight(txn, 12).unwrap(), 3);
        assert_eq!(c.query_rooms(txn, "NYC").unwrap(), 5);
        assert!(c.delete_flight(txn, 12).unwrap());
        c.commit(txn).unwrap();
        assert!(c.committed_customer(id).is_none());

        let txn = c.start().unwrap();
        assert!(!c.delete_customer(txn, id).unwrap());
    }

    #[test]
    fn test_delete_item_refused_while_reserved() {
        let (c, id) = seeded();
        let txn = c.start().unwrap();
        c.reserve_car(txn, id, "NYC").unwrap();
        assert!(!c.delete_cars(txn, "NYC").unwrap());
        assert!(!c.delete_rooms(txn, "LAX").unwrap());
    }

    #[test]
    fn test_bundle_all_or_nothing() {
        let (c, id) = seeded();

        let txn = c.start().unwrap();
        assert!(!c.bundle(txn, id, &[12, 99], "NYC", true, true).unwrap());
        assert_eq!(c.query_flight(txn, 12).unwrap(), 3);
        assert_eq!(c.query_cars(txn, "NYC").unwrap(), 2);
        c.commit(txn).unwrap();
        assert_eq!(c.committed_customer(id).unwrap().reserved_units(), 0);

        let txn = c.start().unwrap();
        assert!(c.bundle(txn, id, &[12, 12], "NYC", true, false).unwrap());
        c.commit(txn).unwrap();

        let customer = c.committed_customer(id).unwrap();
        assert_eq!(customer.reservation("flight-12").unwrap().count, 2);
        assert_eq!(customer.reservation("car-nyc").unwrap().count, 1);
        assert!(customer.reservation("room-nyc").is_none());
    }

    #[test]
    fn test_bundle_duplicate_flights_need_enough_seats() {
        let (c, id) = seeded();
        let txn = c.start().unwrap();
        assert!(!c.bundle(txn, id, &[12, 12, 12, 12], "NYC", false, false).unwrap());
        assert_eq!(c.query_flight(txn, 12).unwrap(), 3);
    }

    #[test]
    fn test_low_stock() {
        let (c, _) = seeded();
        let txn = c.start().unwrap();
        c.add_flight(txn, 40, 50, 200).unwrap();
        let low: Vec<String> = c
            .low_stock(txn, ResourceKind::Flight, 3)
            .unwrap()
            .into_iter()
            .map(|item| item.key)
            .collect();
        assert_eq!(low, vec!["flight-12".to_string()]);
        assert!(c.low_stock(txn, ResourceKind::Customer, 3).is_err());
    }

    #[test]
    fn test_abort_discards_everything() {
        let (c, id) = seeded();
        let txn = c.start().unwrap();
        c.reserve_room(txn, id, "NYC").unwrap();
        c.add_rooms(txn, "BOS", 9, 80).unwrap();
        c.abort(txn).unwrap();

        let check = c.start().unwrap();
        assert_eq!(c.query_rooms(check, "NYC").unwrap(), 5);
        assert_eq!(c.query_rooms(check, "BOS").unwrap(), 0);
        assert_eq!(c.committed_customer(id).unwrap().reserved_units(), 0);
        assert!(c.locks().locks_held(txn).is_empty());
    }

    #[test]
    fn test_terminal_transactions_raise_taxonomy_errors() {
        let c = coordinator();

        let committed = c.start().unwrap();
        c.commit(committed).unwrap();
        assert!(c.commit(committed).unwrap_err().is_invalid_transaction());
        assert!(c.query_rooms(committed, "NYC").unwrap_err().is_invalid_transaction());

        let aborted = c.start().unwrap();
        c.abort(aborted).unwrap();
        assert!(c.abort(aborted).unwrap_err().is_aborted());
        assert!(c.add_rooms(aborted, "NYC", 1, 1).unwrap_err().is_aborted());

        assert!(c.abort(TxnId::new(999)).unwrap_err().is_invalid_transaction());
    }

    #[test]
    fn test_enlists_only_touched_participants() {
        let (c, _) = seeded();
        let txn = c.start().unwrap();
        c.query_rooms(txn, "NYC").unwrap();
        assert_eq!(c.registry().participants(txn), vec![ResourceKind::Room]);
    }

    #[test]
    fn test_expired_transaction_is_aborted_on_use() {
        let config = CoordinatorConfig::for_testing().with_txn_ttl(std::time::Duration::from_millis(20));
        let c = Coordinator::in_process(config).unwrap();
        let txn = c.start().unwrap();
        c.add_rooms(txn, "NYC", 1, 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(60));

        assert!(c.query_rooms(txn, "NYC").unwrap_err().is_aborted());
        assert_eq!(c.registry().state(txn), Some(TransactionState::Aborted));
        assert!(c.locks().locks_held(txn).is_empty());
    }

    #[test]
    fn test_lock_granted_after_finish_is_released() {
        let (c, id) = seeded();
        let late = c.start().unwrap();
        // the abort lands between an operation's validation and its lock
        c.abort(late).unwrap();

        let err = c.lock(late, &customer_key(id), LockMode::Write).unwrap_err();
        assert!(err.is_aborted(), "{err}");
        assert!(c.locks().locks_held(late).is_empty());

        let next = c.start().unwrap();
        assert!(c.delete_customer(next, id).unwrap());
        c.commit(next).unwrap();
    }

    #[test]
    fn test_customer_store_commit_failure_aborts() {
        let (c, id) = seeded();
        let txn = c.start().unwrap();
        assert!(c.reserve_room(txn, id, "NYC").unwrap());
        c.customers.abort(txn).unwrap();

        match c.commit(txn).unwrap_err() {
            TxnError::PartialCommit { committed, failed, .. } => {
                assert_eq!(committed, vec!["rooms".to_string()]);
                assert_eq!(failed, "customers");
            }
            other => panic!("expected a partial commit, got {other}"),
        }
        assert_eq!(c.registry().state(txn), Some(TransactionState::Aborted));
        assert!(c.locks().locks_held(txn).is_empty());
        assert_eq!(c.committed_customer(id).unwrap().reserved_units(), 0);
    }

    #[test]
    fn test_summary_lists_customers_in_key_order() {
        let (c, id) = seeded();
        let txn = c.start().unwrap();
        assert!(c.reserve_flight(txn, id, 12).unwrap());
        assert!(c.new_customer_with_id(txn, CustomerId::new(3)).unwrap());

        let summary = c.summary(txn).unwrap();
        let ids: Vec<_> = summary.iter().map(|customer| customer.id()).collect();
        assert_eq!(ids, vec![CustomerId::new(3), id]);
        assert_eq!(summary[1].reserved_units(), 1);
        assert_eq!(c.locks().mode_held(txn, "customer-3"), Some(LockMode::Write));
        assert_eq!(c.locks().mode_held(txn, "customer-7"), Some(LockMode::Write));

        c.commit(txn).unwrap();

        let reader = c.start().unwrap();
        assert_eq!(c.summary(reader).unwrap().len(), 2);
        assert_eq!(c.locks().mode_held(reader, "customer-7"), Some(LockMode::Read));
    }

    #[test]
    fn test_reap_expired() {
        let config = CoordinatorConfig::for_testing().with_txn_ttl(std::time::Duration::from_millis(20));
        let c = Coordinator::in_process(config).unwrap();
        let idle = c.start().unwrap();
        c.add_cars(idle, "SFO", 1, 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(60));

        assert_eq!(c.reap_expired(), vec![idle]);
        assert!(c.reap_expired().is_empty());
        assert!(c.commit(idle).unwrap_err().is_aborted());
        assert_eq!(c.stats().reaped.load(AtomicOrdering::Relaxed), 1);
    }
}
