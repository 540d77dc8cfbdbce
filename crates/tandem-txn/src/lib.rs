//! # tandem-txn
//!
//! Transaction primitives for Tandem.
//!
//! This crate provides the building blocks the coordinator and the
//! resource managers share:
//!
//! - **Lock Management**: Key-level locking with READ and WRITE modes,
//!   upgrades and FIFO wait queues. Acquisition blocks the calling thread.
//!
//! - **Deadlock Detection**: Wait-for graph cycle detection, run on every
//!   blocking attempt. The request that closes a cycle is refused.
//!
//! - **Transaction Registry**: Lifecycle states, time-to-live tracking and
//!   participant enlistment, with a single atomic claim out of `Active`.
//!
//! - **Shadow Store**: An authoritative key-value map plus per-transaction
//!   copy-on-first-touch buffers, giving snapshot isolation per key.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        Coordinator                             │
//! │                           │                                    │
//! │    ┌──────────────────────┼──────────────────────┐            │
//! │    │                      │                      │            │
//! │    ▼                      ▼                      ▼            │
//! │ ┌──────────────┐   ┌───────────────┐    ┌──────────────────┐  │
//! │ │ Transaction  │   │  ShadowStore  │    │   LockManager    │  │
//! │ │  Registry    │   │  (customers)  │    │                  │  │
//! │ └──────────────┘   └───────────────┘    └──────────────────┘  │
//! │                                                 │             │
//! │                                                 ▼             │
//! │                                        ┌──────────────────┐  │
//! │                                        │  WaitForGraph    │  │
//! │                                        └──────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use tandem_txn::{LockManager, LockMode, Outcome, ShadowStore, TransactionRegistry, TransactionState};
//!
//! let registry = TransactionRegistry::new(Duration::from_secs(25));
//! let locks = LockManager::new();
//! let store: ShadowStore<u32> = ShadowStore::new("rooms");
//!
//! let txn = registry.begin();
//! locks.acquire(txn, "room-nyc", LockMode::Write).unwrap();
//! store.start(txn).unwrap();
//! store.write(txn, "room-nyc", 5).unwrap();
//! assert_eq!(store.read(txn, "room-nyc").unwrap(), Some(5));
//!
//! registry.claim(txn, TransactionState::Committing).unwrap();
//! store.commit(txn).unwrap();
//! locks.release(txn);
//! registry.complete(txn, Outcome::Committed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Transaction lifecycle tracking.
///
/// This module provides:
/// - [`registry::TransactionRegistry`]: Begin, validate, claim and complete
/// - [`registry::Transaction`]: A live transaction's entry
/// - [`registry::TransactionState`]: Transaction lifecycle states
pub mod registry;

/// Lock table implementation.
///
/// This module provides:
/// - [`lock::LockManager`]: Manages all locks
/// - [`lock::LockMode`]: Read and Write
/// - [`lock::LockError`]: Deadlock and cancellation
pub mod lock;

/// Deadlock detection.
///
/// This module provides:
/// - [`deadlock::WaitForGraph`]: Tracks transaction dependencies
/// - [`deadlock::DeadlockInfo`]: Information about detected deadlocks
pub mod deadlock;

/// Shadow-buffered storage.
pub mod shadow;

// Re-export commonly used types

pub use registry::{Outcome, Transaction, TransactionRegistry, TransactionState, TransactionStats};

pub use lock::{
    LockError, LockManager, LockManagerConfig, LockMode, LockRequest, LockResult, LockStats,
};

pub use deadlock::{DeadlockInfo, WaitForGraph};

pub use shadow::ShadowStore;
