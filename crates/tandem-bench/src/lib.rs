//! Tandem Performance Benchmarks
//!
//! This crate contains benchmarks for the Tandem components:
//! - Lock manager acquire/release, uncontended and with shared readers
//! - Shadow store write and commit
//! - Coordinator booking transactions end to end
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p tandem-bench
//! ```

pub mod utils;
