//! Configuration for Tandem.
//!
//! This module provides configuration structures for the coordinator and
//! the components it owns.

mod coordinator;

pub use coordinator::CoordinatorConfig;
