//! Workload generators.
//!
//! [`BookingWorkload`] runs concurrent booking transactions against one
//! coordinator. Each transaction performs a few random operations over a
//! small key space, so lock conflicts and deadlocks are common. Afterwards
//! [`check_conservation`] verifies that no unit was created or lost.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tandem_common::error::{TxnError, TxnResult};
use tandem_common::types::{ResourceKind, TxnId};
use tandem_coordinator::Coordinator;

use crate::utils::Inventory;

/// Workload shape.
#[derive(Debug, Clone)]
pub struct BookingWorkload {
    /// Worker threads.
    pub threads: usize,
    /// Transactions attempted per thread.
    pub txns_per_thread: usize,
    /// Operations per transaction.
    pub ops_per_txn: usize,
    /// Seed; thread `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for BookingWorkload {
    fn default() -> Self {
        Self {
            threads: 4,
            txns_per_thread: 50,
            ops_per_txn: 3,
            seed: 0x7a4d,
        }
    }
}

/// What a workload run did.
#[derive(Debug, Default)]
pub struct WorkloadReport {
    /// Transactions that committed.
    pub committed: AtomicU64,
    /// Transactions aborted by the coordinator (deadlock or TTL).
    pub aborted: AtomicU64,
    /// Transactions the client chose to abort.
    pub rolled_back: AtomicU64,
    /// Operations that returned a business failure.
    pub refused: AtomicU64,
}

impl WorkloadReport {
    /// Total transactions that reached a terminal state.
    pub fn total(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
            + self.aborted.load(Ordering::SeqCst)
            + self.rolled_back.load(Ordering::SeqCst)
    }
}

impl BookingWorkload {
    /// Runs the workload to completion.
    ///
    /// Errors other than `TransactionAborted` are returned; they mean the
    /// coordinator misbehaved.
    pub fn run(&self, coordinator: &Arc<Coordinator>, inventory: &Inventory) -> TxnResult<Arc<WorkloadReport>> {
        let report = Arc::new(WorkloadReport::default());
        let inventory = Arc::new(inventory.clone());

        let workers: Vec<_> = (0..self.threads)
            .map(|i| {
                let coordinator = Arc::clone(coordinator);
                let report = Arc::clone(&report);
                let inventory = Arc::clone(&inventory);
                let shape = self.clone();
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(shape.seed + i as u64);
                    for _ in 0..shape.txns_per_thread {
                        shape.one_transaction(&coordinator, &inventory, &report, &mut rng)?;
                    }
                    Ok::<(), TxnError>(())
                })
            })
            .collect();

        for worker in workers {
            match worker.join() {
                Ok(result) => result?,
                Err(_) => return Err(TxnError::internal("workload thread panicked")),
            }
        }
        Ok(report)
    }

    fn one_transaction(
        &self,
        tm: &Coordinator,
        inventory: &Inventory,
        report: &WorkloadReport,
        rng: &mut StdRng,
    ) -> TxnResult<()> {
        let txn = tm.start()?;

        for _ in 0..self.ops_per_txn {
            match random_op(tm, txn, inventory, rng) {
                Ok(true) => {}
                Ok(false) => {
                    report.refused.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) if err.is_aborted() => {
                    report.aborted.fetch_add(1, Ordering::SeqCst);
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }

        if rng.gen_ratio(1, 10) {
            tm.abort(txn)?;
            report.rolled_back.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        match tm.commit(txn) {
            Ok(_) => {
                report.committed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(err) if err.is_aborted() => {
                report.aborted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn random_op(tm: &Coordinator, txn: TxnId, inventory: &Inventory, rng: &mut StdRng) -> TxnResult<bool> {
    let customer = inventory.customers[rng.gen_range(0..inventory.customers.len())];
    let (number, _, _) = inventory.flights[rng.gen_range(0..inventory.flights.len())];
    let location = inventory.places[rng.gen_range(0..inventory.places.len())].0.clone();

    match rng.gen_range(0..6) {
        0 => tm.reserve_flight(txn, customer, number),
        1 => tm.reserve_car(txn, customer, &location),
        2 => tm.reserve_room(txn, customer, &location),
        3 => tm.bundle(txn, customer, &[number, number], &location, rng.gen(), rng.gen()),
        4 => {
            let deleted = tm.delete_customer(txn, customer)?;
            tm.new_customer_with_id(txn, customer)?;
            Ok(deleted)
        }
        _ => tm.query_customer_info(txn, customer).map(|bill| !bill.is_empty()),
    }
}

/// Checks that every unit is either in stock or reserved by exactly one
/// committed customer, against the committed state.
pub fn check_conservation(tm: &Coordinator, inventory: &Inventory) -> Result<(), String> {
    let mut reserved_by_customers: BTreeMap<String, u32> = BTreeMap::new();
    for id in &inventory.customers {
        if let Some(customer) = tm.committed_customer(*id) {
            for reservation in customer.reservations() {
                *reserved_by_customers.entry(reservation.key.clone()).or_default() += reservation.count;
            }
        }
    }

    let mut expected: BTreeMap<String, u32> = BTreeMap::new();
    for (number, seats, _) in &inventory.flights {
        expected.insert(ResourceKind::Flight.key(number), *seats);
    }
    for (location, cars, _, rooms, _) in &inventory.places {
        expected.insert(ResourceKind::Car.key(location), *cars);
        expected.insert(ResourceKind::Room.key(location), *rooms);
    }

    let txn = tm.start().map_err(|e| e.to_string())?;
    let mut items = Vec::new();
    for kind in ResourceKind::RESERVABLE {
        items.extend(tm.low_stock(txn, kind, u32::MAX).map_err(|e| e.to_string())?);
    }
    tm.abort(txn).map_err(|e| e.to_string())?;

    for item in items {
        let Some(capacity) = expected.remove(&item.key) else {
            return Err(format!("unexpected item {}", item.key));
        };
        if item.count + item.reserved != capacity {
            return Err(format!("{item}: expected capacity {capacity}"));
        }
        let held = reserved_by_customers.remove(&item.key).unwrap_or(0);
        if held != item.reserved {
            return Err(format!("{item}: customers hold {held}"));
        }
    }

    if let Some(key) = expected.keys().next() {
        return Err(format!("item {key} disappeared"));
    }
    if let Some((key, held)) = reserved_by_customers.iter().next() {
        return Err(format!("customers hold {held} of unknown item {key}"));
    }
    Ok(())
}
