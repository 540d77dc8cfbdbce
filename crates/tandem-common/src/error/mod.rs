//! Error handling for Tandem.
//!
//! This module provides the transactional error taxonomy and result alias
//! used across all Tandem components.

mod transaction;

pub use transaction::{ErrorCode, TxnError};

/// Result type alias for transactional operations.
pub type TxnResult<T> = std::result::Result<T, TxnError>;
