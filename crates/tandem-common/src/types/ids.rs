//! Core identifier types for Tandem.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of transaction and customer ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier (xid) - uniquely identifies a transaction.
///
/// Transaction IDs are allocated by the coordinator, are monotonically
/// increasing and are used to:
/// - Track transaction state in the registry
/// - Key per-transaction shadow buffers in every participant
/// - Label wait-for edges in the lock manager
///
/// # Example
///
/// ```rust
/// use tandem_common::types::TxnId;
///
/// let txn = TxnId::new(1);
/// assert!(txn.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TxnId(u64);

impl TxnId {
    /// Invalid transaction ID, used as a sentinel value.
    pub const INVALID: Self = Self(0);

    /// Minimum valid transaction ID (the first one a coordinator hands out).
    pub const MIN: Self = Self(1);

    /// Creates a new `TxnId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next transaction ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid transaction ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "TxnId(INVALID)")
        } else {
            write!(f, "TxnId({})", self.0)
        }
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TxnId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<TxnId> for u64 {
    #[inline]
    fn from(id: TxnId) -> Self {
        id.0
    }
}

/// Customer identifier.
///
/// Customers live in the coordinator's own domain under the key
/// `customer-<id>`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CustomerId(u32);

impl CustomerId {
    /// Creates a new `CustomerId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomerId({})", self.0)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CustomerId {
    #[inline]
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}
