//! # tandem-test
//!
//! Integration tests for Tandem.
//!
//! This crate contains:
//! - Fixtures for building and seeding coordinators
//! - Fault injection through a wrapping participant
//! - A concurrent booking workload and its conservation check
//!
//! The scenarios themselves live in `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;

/// Fault injection
pub mod chaos;

/// Workload generators
pub mod workload;

pub use chaos::{Fault, FaultyParticipant};
pub use utils::{coordinator, coordinator_over, coordinator_with, seed, short_ttl, wait_until, Inventory};
pub use workload::{check_conservation, BookingWorkload, WorkloadReport};
