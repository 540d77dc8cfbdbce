//! # tandem-rm
//!
//! Resource managers for Tandem.
//!
//! A resource manager owns one reservable domain (flights, cars or rooms)
//! and takes part in the coordinator's transactions through the
//! [`Participant`] trait.
//!
//! - **Items**: [`ReservableItem`], [`Customer`] and [`ReservedItem`]
//! - **Participant**: the capability-typed interface the coordinator drives
//! - **Manager**: [`ResourceManager`], an in-process participant backed by a
//!   shadow store
//!
//! # Example
//!
//! ```rust
//! use tandem_common::types::{room_key, ResourceKind, TxnId};
//! use tandem_rm::{Participant, ResourceManager};
//!
//! let rooms = ResourceManager::new(ResourceKind::Room);
//! let txn = TxnId::new(1);
//! rooms.start_transaction(txn).unwrap();
//! rooms.add_item(txn, &room_key("NYC"), "NYC", 5, 100).unwrap();
//! assert_eq!(rooms.query_count(txn, &room_key("NYC")).unwrap(), 5);
//! rooms.commit(txn).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod item;
pub mod manager;
pub mod participant;

pub use item::{Customer, ReservableItem, ReservedItem};
pub use manager::ResourceManager;
pub use participant::Participant;
