//! Locking, deadlock and TTL behavior with real threads.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tandem_common::types::CustomerId;
use tandem_common::TxnResult;
use tandem_test::{check_conservation, coordinator, seed, short_ttl, wait_until, BookingWorkload, Inventory};
use tandem_txn::{LockMode, TransactionState};

const PATIENCE: Duration = Duration::from_secs(5);

#[test]
fn test_write_lock_blocks_readers_and_writers() {
    let tm = coordinator();
    seed(&tm, &Inventory::default());

    let writer = tm.start().unwrap();
    tm.add_cars(writer, "NYC", 1, 0).unwrap();

    let reader = tm.start().unwrap();
    let other_writer = tm.start().unwrap();
    let r = {
        let tm = Arc::clone(&tm);
        thread::spawn(move || tm.query_cars(reader, "NYC"))
    };
    assert!(wait_until(PATIENCE, || tm.locks().is_waiting(reader)));
    let w = {
        let tm = Arc::clone(&tm);
        thread::spawn(move || tm.delete_cars(other_writer, "NYC"))
    };
    assert!(wait_until(PATIENCE, || tm.locks().is_waiting(other_writer)));
    thread::sleep(Duration::from_millis(50));
    assert!(!r.is_finished());
    assert!(!w.is_finished());

    tm.commit(writer).unwrap();
    assert_eq!(r.join().unwrap().unwrap(), 3);
    tm.commit(reader).unwrap();
    assert!(w.join().unwrap().unwrap());
}

#[test]
fn test_disjoint_keys_do_not_block() {
    let tm = coordinator();
    seed(&tm, &Inventory::default());

    let a = tm.start().unwrap();
    let b = tm.start().unwrap();
    tm.reserve_flight(a, CustomerId::new(1), 12).unwrap();
    tm.reserve_flight(b, CustomerId::new(7), 40).unwrap();
    tm.commit(b).unwrap();
    tm.commit(a).unwrap();
}

#[test]
fn test_deadlock_aborts_exactly_one() {
    let tm = coordinator();
    seed(&tm, &Inventory::default());

    let t1 = tm.start().unwrap();
    let t2 = tm.start().unwrap();
    tm.add_flight(t1, 12, 1, 0).unwrap();
    tm.add_flight(t2, 40, 1, 0).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let run = |txn, number| {
        let tm = Arc::clone(&tm);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || -> TxnResult<bool> {
            barrier.wait();
            tm.add_flight(txn, number, 1, 0)?;
            tm.commit(txn)
        })
    };
    let h1 = run(t1, 40);
    let h2 = run(t2, 12);

    let results = [h1.join().unwrap(), h2.join().unwrap()];
    let aborted = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_aborted()))
        .count();
    let committed = results.iter().filter(|r| matches!(r, Ok(true))).count();
    assert_eq!(aborted, 1);
    assert_eq!(committed, 1);
    assert_eq!(tm.stats().deadlock_aborts.load(Ordering::Relaxed), 1);

    // the survivor's two additions are committed, the victim's are not
    let check = tm.start().unwrap();
    let seats = tm.query_flight(check, 12).unwrap() + tm.query_flight(check, 40).unwrap();
    assert_eq!(seats, 3 + 50 + 2);
    assert!(tm.locks().locks_held(t1).is_empty());
    assert!(tm.locks().locks_held(t2).is_empty());
}

#[test]
fn test_upgrade_deadlock_refuses_one_reader() {
    let tm = coordinator();
    seed(&tm, &Inventory::default());

    let t1 = tm.start().unwrap();
    let t2 = tm.start().unwrap();
    assert_eq!(tm.query_rooms(t1, "NYC").unwrap(), 5);
    assert_eq!(tm.query_rooms(t2, "NYC").unwrap(), 5);

    let upgrade = |txn, id| {
        let tm = Arc::clone(&tm);
        thread::spawn(move || tm.reserve_room(txn, CustomerId::new(id), "NYC"))
    };
    let h1 = upgrade(t1, 1);
    assert!(wait_until(PATIENCE, || tm.locks().is_waiting(t1)));
    let h2 = upgrade(t2, 7);

    let r1 = h1.join().unwrap();
    let r2 = h2.join().unwrap();
    assert!(r1.as_ref().is_ok_and(|ok| *ok));
    assert!(r2.unwrap_err().is_aborted());
    assert_eq!(tm.registry().state(t2), Some(TransactionState::Aborted));

    tm.commit(t1).unwrap();
    let check = tm.start().unwrap();
    assert_eq!(tm.query_rooms(check, "NYC").unwrap(), 4);
}

#[test]
fn test_queued_writer_not_overtaken_by_readers() {
    let tm = coordinator();
    seed(&tm, &Inventory::default());

    let holder = tm.start().unwrap();
    tm.query_flight(holder, 40).unwrap();

    let writer = tm.start().unwrap();
    let w = {
        let tm = Arc::clone(&tm);
        thread::spawn(move || tm.delete_flight(writer, 40))
    };
    assert!(wait_until(PATIENCE, || tm.locks().is_waiting(writer)));

    let late_reader = tm.start().unwrap();
    let r = {
        let tm = Arc::clone(&tm);
        thread::spawn(move || tm.query_flight(late_reader, 40))
    };
    assert!(wait_until(PATIENCE, || tm.locks().is_waiting(late_reader)));
    assert_eq!(tm.locks().waits_for(late_reader), vec![writer]);

    tm.commit(holder).unwrap();
    assert!(w.join().unwrap().unwrap());
    assert_eq!(tm.locks().mode_held(writer, "flight-40"), Some(LockMode::Write));
    tm.commit(writer).unwrap();

    // the reader saw the flight only after it was deleted
    assert_eq!(r.join().unwrap().unwrap(), 0);
}

#[test]
fn test_reaper_releases_locks_of_idle_transaction() {
    let tm = short_ttl(Duration::from_millis(200), Duration::from_millis(20));
    seed(&tm, &Inventory::default());
    let _reaper = tm.start_reaper().unwrap();

    let idle = tm.start().unwrap();
    tm.add_rooms(idle, "NYC", 1, 0).unwrap();

    // the waiter starts late so it is still within its own TTL when granted
    thread::sleep(Duration::from_millis(120));
    let waiter = tm.start().unwrap();
    let h = {
        let tm = Arc::clone(&tm);
        thread::spawn(move || tm.query_rooms(waiter, "NYC"))
    };

    assert_eq!(h.join().unwrap().unwrap(), 5);
    assert_eq!(tm.registry().state(idle), Some(TransactionState::Aborted));
    assert!(tm.locks().locks_held(idle).is_empty());
    assert!(tm.commit(idle).unwrap_err().is_aborted());
    assert!(tm.stats().reaped.load(Ordering::Relaxed) >= 1);
}

#[test]
fn test_waiter_expired_while_blocked_is_aborted_after_grant() {
    // no reaper: only the re-check after the grant can notice the expiry
    let tm = short_ttl(Duration::from_millis(100), Duration::from_secs(60));
    seed(&tm, &Inventory::default());

    let holder = tm.start().unwrap();
    tm.add_rooms(holder, "NYC", 1, 0).unwrap();

    let waiter = tm.start().unwrap();
    let h = {
        let tm = Arc::clone(&tm);
        thread::spawn(move || tm.query_rooms(waiter, "NYC"))
    };
    assert!(wait_until(PATIENCE, || tm.locks().is_waiting(waiter)));
    thread::sleep(Duration::from_millis(250));
    assert!(tm.commit(holder).unwrap());

    let err = h.join().unwrap().unwrap_err();
    assert!(err.is_aborted(), "{err}");
    assert_eq!(tm.registry().state(waiter), Some(TransactionState::Aborted));
    assert!(tm.locks().locks_held(waiter).is_empty());
    assert_eq!(tm.locks().lock_count(), 0);
}

#[test]
fn test_commit_and_reap_race_has_one_winner() {
    let tm = short_ttl(Duration::from_millis(30), Duration::from_millis(5));
    let _reaper = tm.start_reaper().unwrap();

    for _ in 0..20 {
        let txn = tm.start().unwrap();
        tm.add_cars(txn, "SFO", 1, 10).unwrap();
        thread::sleep(Duration::from_millis(28));

        match tm.commit(txn) {
            Ok(committed) => {
                assert!(committed);
                assert_eq!(tm.registry().state(txn), Some(TransactionState::Committed));
            }
            Err(err) => {
                assert!(err.is_aborted(), "{err}");
                assert!(wait_until(PATIENCE, || {
                    tm.registry().state(txn) == Some(TransactionState::Aborted)
                        && tm.locks().locks_held(txn).is_empty()
                }));
            }
        }
        assert!(tm.locks().locks_held(txn).is_empty());
    }
}

#[test]
fn test_concurrent_bookings_conserve_inventory() {
    let tm = coordinator();
    let inventory = Inventory {
        flights: vec![(12, 6, 300), (40, 4, 200), (77, 9, 150)],
        places: vec![("NYC".to_string(), 3, 50, 5, 100), ("SFO".to_string(), 4, 60, 2, 120)],
        customers: (1..=6).map(CustomerId::new).collect(),
    };
    seed(&tm, &inventory);

    let workload = BookingWorkload {
        threads: 6,
        txns_per_thread: 40,
        ops_per_txn: 3,
        seed: 11,
    };
    let report = workload.run(&tm, &inventory).unwrap();

    assert_eq!(report.total(), 240);
    assert!(report.committed.load(Ordering::SeqCst) > 0);
    assert_eq!(tm.registry().active_count(), 0);
    assert_eq!(tm.locks().lock_count(), 0);
    check_conservation(&tm, &inventory).unwrap();
}
