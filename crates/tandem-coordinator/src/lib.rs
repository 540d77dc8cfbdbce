//! # tandem-coordinator
//!
//! The transaction coordinator for Tandem.
//!
//! The coordinator hands out transaction ids, takes strict two-phase locks
//! on every key an operation touches, enlists participants lazily and
//! drives commit and abort across them.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Coordinator                        │
//! │  ┌──────────────┐  ┌─────────────┐  ┌──────────────────┐  │
//! │  │ Transaction  │  │    Lock     │  │  Customer store  │  │
//! │  │  Registry    │  │   Manager   │  │  (ShadowStore)   │  │
//! │  └──────────────┘  └─────────────┘  └──────────────────┘  │
//! └───────────────┬─────────────┬─────────────┬───────────────┘
//!                 │             │             │
//!            ┌────▼────┐   ┌────▼────┐   ┌────▼────┐
//!            │ flights │   │  cars   │   │  rooms  │
//!            └─────────┘   └─────────┘   └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use tandem_common::config::CoordinatorConfig;
//! use tandem_coordinator::Coordinator;
//!
//! let tm = Coordinator::in_process(CoordinatorConfig::default()).unwrap();
//! let txn = tm.start().unwrap();
//! tm.add_rooms(txn, "NYC", 5, 100).unwrap();
//! let customer = tm.new_customer(txn).unwrap();
//! assert!(tm.reserve_room(txn, customer, "NYC").unwrap());
//! assert!(tm.commit(txn).unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod participants;
pub mod reaper;

pub use coordinator::{Coordinator, CoordinatorStats};
pub use participants::ParticipantRegistry;
pub use reaper::ReaperHandle;
