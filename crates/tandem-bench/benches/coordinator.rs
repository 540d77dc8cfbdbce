//! End-to-end coordinator benchmarks for Tandem.
//!
//! Benchmarks for:
//! - A read-only query transaction
//! - A reserve-then-commit transaction
//! - A bundle over several locations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tandem_bench::utils::{generate_locations, seeded_coordinator};
use tandem_common::types::CustomerId;

/// Benchmark a transaction that queries one location.
fn bench_query(c: &mut Criterion) {
    let locations = generate_locations(64);
    let tm = seeded_coordinator(&locations, 1_000_000, 1);
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("coordinator/query_commit", |b| {
        b.iter(|| {
            let location = &locations[rng.gen_range(0..locations.len())];
            let txn = tm.start().ok()?;
            black_box(tm.query_rooms(txn, location).ok());
            tm.commit(txn).ok()
        });
    });
}

/// Benchmark a transaction that reserves one room and commits.
fn bench_reserve(c: &mut Criterion) {
    let locations = generate_locations(64);
    let tm = seeded_coordinator(&locations, 1_000_000, 100);
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("coordinator/reserve_commit", |b| {
        b.iter(|| {
            let location = &locations[rng.gen_range(0..locations.len())];
            let customer = CustomerId::new(rng.gen_range(1..=100));
            let txn = tm.start().ok()?;
            black_box(tm.reserve_room(txn, customer, location).ok());
            tm.commit(txn).ok()
        });
    });
}

/// Benchmark bundles that lock an increasing number of items.
fn bench_bundle(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator/bundle");
    let locations = generate_locations(8);
    let tm = seeded_coordinator(&locations, 1_000_000, 10);

    for flights in [0usize, 4, 16].iter() {
        let txn = match tm.start() {
            Ok(txn) => txn,
            Err(err) => panic!("{err}"),
        };
        for number in 0..*flights {
            if let Err(err) = tm.add_flight(txn, number as u32, 1_000_000, 300) {
                panic!("{err}");
            }
        }
        if let Err(err) = tm.commit(txn) {
            panic!("{err}");
        }
        let numbers: Vec<u32> = (0..*flights as u32).collect();
        let mut rng = StdRng::seed_from_u64(7);

        group.bench_with_input(BenchmarkId::from_parameter(flights), flights, |b, _| {
            b.iter(|| {
                let location = &locations[rng.gen_range(0..locations.len())];
                let customer = CustomerId::new(rng.gen_range(1..=10));
                let txn = tm.start().ok()?;
                black_box(tm.bundle(txn, customer, &numbers, location, false, true).ok());
                tm.commit(txn).ok()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_query, bench_reserve, bench_bundle);
criterion_main!(benches);
