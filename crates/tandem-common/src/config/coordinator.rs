//! Coordinator configuration structures.
//!
//! These structures define the tunable aspects of a coordinator: how long an
//! idle transaction may live, how often the reaper scans, and whether the
//! lock manager runs deadlock detection.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_REAPER_INTERVAL_MS, DEFAULT_TXN_TTL_MS};

/// Coordinator configuration.
///
/// # Example
///
/// ```rust
/// use tandem_common::config::CoordinatorConfig;
///
/// let config = CoordinatorConfig::default();
/// assert_eq!(config.txn_ttl().as_millis(), 25_000);
/// assert!(config.deadlock_detection);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Idle time after which an active transaction is reaped, in milliseconds.
    #[serde(default = "default_txn_ttl_ms")]
    pub txn_ttl_ms: u64,

    /// Interval between reaper scans, in milliseconds.
    #[serde(default = "default_reaper_interval_ms")]
    pub reaper_interval_ms: u64,

    /// Whether blocking lock requests check the wait-for graph for cycles.
    #[serde(default = "default_deadlock_detection")]
    pub deadlock_detection: bool,
}

fn default_txn_ttl_ms() -> u64 {
    DEFAULT_TXN_TTL_MS
}

fn default_reaper_interval_ms() -> u64 {
    DEFAULT_REAPER_INTERVAL_MS
}

fn default_deadlock_detection() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            txn_ttl_ms: default_txn_ttl_ms(),
            reaper_interval_ms: default_reaper_interval_ms(),
            deadlock_detection: default_deadlock_detection(),
        }
    }
}

impl CoordinatorConfig {
    /// Creates a configuration with short timings for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            txn_ttl_ms: 2_000,
            reaper_interval_ms: 50,
            deadlock_detection: true,
        }
    }

    /// Sets the transaction time-to-live.
    #[must_use]
    pub fn with_txn_ttl(mut self, ttl: Duration) -> Self {
        self.txn_ttl_ms = duration_to_ms(ttl);
        self
    }

    /// Sets the reaper scan interval.
    #[must_use]
    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval_ms = duration_to_ms(interval);
        self
    }

    /// Enables or disables deadlock detection.
    #[must_use]
    pub fn with_deadlock_detection(mut self, enabled: bool) -> Self {
        self.deadlock_detection = enabled;
        self
    }

    /// Returns the transaction time-to-live.
    #[must_use]
    pub fn txn_ttl(&self) -> Duration {
        Duration::from_millis(self.txn_ttl_ms)
    }

    /// Returns the reaper scan interval.
    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.txn_ttl_ms == 0 {
            return Err("txn_ttl_ms must be greater than zero".to_string());
        }

        if self.reaper_interval_ms == 0 {
            return Err("reaper_interval_ms must be greater than zero".to_string());
        }

        Ok(())
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
