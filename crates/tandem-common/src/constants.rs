//! System-wide constants for Tandem.

// =============================================================================
// Transaction Lifetime
// =============================================================================

/// Default idle time-to-live of a transaction (25 seconds).
pub const DEFAULT_TXN_TTL_MS: u64 = 25_000;

/// Default interval between TTL reaper scans (3.5 seconds).
pub const DEFAULT_REAPER_INTERVAL_MS: u64 = 3_500;

// =============================================================================
// Customers
// =============================================================================

/// Upper bound (exclusive) of the random suffix appended to generated
/// customer ids.
pub const CUSTOMER_ID_SUFFIX_RANGE: u32 = 1_000;

/// Attempts made to find an unused generated customer id before giving up.
pub const CUSTOMER_ID_ATTEMPTS: usize = 16;
