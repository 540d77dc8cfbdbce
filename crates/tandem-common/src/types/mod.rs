//! Type definitions for Tandem.
//!
//! This module contains the identifier and key types shared by the lock
//! manager, the participants and the coordinator.

mod ids;
mod keys;

pub use ids::{CustomerId, TxnId};
pub use keys::{car_key, customer_key, flight_key, room_key, ResourceKind};
