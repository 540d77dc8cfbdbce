//! Benchmark utilities and helpers.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tandem_common::config::CoordinatorConfig;
use tandem_common::types::CustomerId;
use tandem_coordinator::Coordinator;

/// Generates a random location name.
pub fn random_location(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates sequential keys for benchmarks.
pub fn generate_sequential_keys(count: usize, prefix: &str) -> Vec<String> {
    (0..count).map(|i| format!("{}{:08}", prefix, i)).collect()
}

/// Generates `count` distinct locations.
pub fn generate_locations(count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| format!("{}{i}", random_location(&mut rng, 6)))
        .collect()
}

/// Creates a coordinator with one room location per entry in `locations`,
/// `rooms` rooms each, and customers `1..=customers`.
///
/// Panics if seeding fails; benchmarks have no error path.
pub fn seeded_coordinator(locations: &[String], rooms: u32, customers: u32) -> Coordinator {
    let tm = match Coordinator::in_process(CoordinatorConfig::default()) {
        Ok(tm) => tm,
        Err(err) => panic!("bench coordinator: {err}"),
    };

    let seeded = tm.start().and_then(|txn| {
        for location in locations {
            tm.add_rooms(txn, location, rooms, 100)?;
        }
        for id in 1..=customers {
            tm.new_customer_with_id(txn, CustomerId::new(id))?;
        }
        tm.commit(txn)
    });
    if let Err(err) = seeded {
        panic!("seeding failed: {err}");
    }
    tm
}
