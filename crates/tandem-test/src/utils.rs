//! Test utilities and helpers.

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use tandem_common::config::CoordinatorConfig;
use tandem_common::error::TxnResult;
use tandem_common::types::CustomerId;
use tandem_coordinator::{Coordinator, ParticipantRegistry};
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-friendly subscriber once per process.
///
/// Honors `RUST_LOG`; silent otherwise.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A coordinator over in-process managers with short test timings.
pub fn coordinator() -> Arc<Coordinator> {
    coordinator_with(CoordinatorConfig::for_testing())
}

/// A coordinator over in-process managers with the given configuration.
pub fn coordinator_with(config: CoordinatorConfig) -> Arc<Coordinator> {
    init_logging();
    match Coordinator::in_process(config) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(err) => panic!("test coordinator: {err}"),
    }
}

/// A coordinator over explicit participants.
pub fn coordinator_over(participants: ParticipantRegistry) -> Arc<Coordinator> {
    init_logging();
    match Coordinator::new(CoordinatorConfig::for_testing(), participants) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(err) => panic!("test coordinator: {err}"),
    }
}

/// A coordinator whose transactions expire after `ttl`, reaped every `interval`.
pub fn short_ttl(ttl: Duration, interval: Duration) -> Arc<Coordinator> {
    coordinator_with(
        CoordinatorConfig::for_testing()
            .with_txn_ttl(ttl)
            .with_reaper_interval(interval),
    )
}

/// Inventory committed by [`seed`].
#[derive(Debug, Clone)]
pub struct Inventory {
    /// Flights as `(number, seats, price)`.
    pub flights: Vec<(u32, u32, u32)>,
    /// Locations as `(location, cars, car price, rooms, room price)`.
    pub places: Vec<(String, u32, u32, u32, u32)>,
    /// Customers.
    pub customers: Vec<CustomerId>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            flights: vec![(12, 3, 300), (40, 50, 200)],
            places: vec![("NYC".to_string(), 2, 50, 5, 100)],
            customers: vec![CustomerId::new(1), CustomerId::new(7)],
        }
    }
}

/// Commits `inventory` in one transaction.
pub fn seed(coordinator: &Coordinator, inventory: &Inventory) {
    if let Err(err) = try_seed(coordinator, inventory) {
        panic!("seeding failed: {err}");
    }
}

fn try_seed(coordinator: &Coordinator, inventory: &Inventory) -> TxnResult<bool> {
    let txn = coordinator.start()?;
    for (number, seats, price) in &inventory.flights {
        coordinator.add_flight(txn, *number, *seats, *price)?;
    }
    for (location, cars, car_price, rooms, room_price) in &inventory.places {
        coordinator.add_cars(txn, location, *cars, *car_price)?;
        coordinator.add_rooms(txn, location, *rooms, *room_price)?;
    }
    for id in &inventory.customers {
        coordinator.new_customer_with_id(txn, *id)?;
    }
    coordinator.commit(txn)
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_commits_inventory() {
        let tm = coordinator();
        seed(&tm, &Inventory::default());

        let txn = tm.start().unwrap();
        assert_eq!(tm.query_flight(txn, 12).unwrap(), 3);
        assert_eq!(tm.query_cars(txn, "NYC").unwrap(), 2);
        assert_eq!(tm.query_rooms_price(txn, "NYC").unwrap(), 100);
        assert!(tm.committed_customer(CustomerId::new(7)).is_some());
    }

    #[test]
    fn test_wait_until() {
        assert!(wait_until(Duration::from_millis(10), || true));
        assert!(!wait_until(Duration::from_millis(10), || false));
    }
}
