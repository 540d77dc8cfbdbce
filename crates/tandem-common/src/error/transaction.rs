//! Transaction error types.
//!
//! Provides the error taxonomy surfaced by every transactional operation.
//! Business failures (item missing, sold out, unknown customer) are not
//! errors; they are returned as `false`/`None` results.

use std::fmt;
use thiserror::Error;

use crate::types::{ResourceKind, TxnId};

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,

    // Transaction errors (0x0300 - 0x03FF)
    /// Transaction does not exist or has already committed.
    InvalidTransaction = 0x0300,
    /// Transaction was aborted (explicitly, by deadlock or by TTL).
    TransactionAborted = 0x0301,
    /// Some participants committed before another one failed.
    PartialCommit = 0x0303,

    // Participant errors (0x0500 - 0x05FF)
    /// No participant registered for a resource kind.
    ParticipantUnavailable = 0x0500,
    /// A participant call failed.
    ParticipantFault = 0x0501,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x03 => "Transaction",
            0x05 => "Participant",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The error type for transactional operations.
///
/// `InvalidTransaction` and `TransactionAborted` are deliberately distinct:
/// the first means the xid is meaningless (never existed, or already
/// committed), the second means the caller must begin a new transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxnError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Transaction Errors
    // ==========================================================================
    /// The transaction never existed or has already committed.
    #[error("transaction {txn_id} is invalid: {reason}")]
    InvalidTransaction {
        /// The offending transaction.
        txn_id: TxnId,
        /// Why it is invalid.
        reason: String,
    },

    /// The transaction was aborted.
    #[error("transaction {txn_id} has been aborted: {reason}")]
    TransactionAborted {
        /// The aborted transaction.
        txn_id: TxnId,
        /// Reason for abort.
        reason: String,
    },

    /// A participant failed to commit after others had already committed.
    #[error(
        "transaction {txn_id} partially committed: {failed} failed after {committed:?} committed: {message}"
    )]
    PartialCommit {
        /// The transaction.
        txn_id: TxnId,
        /// Participants that had already committed.
        committed: Vec<String>,
        /// The participant whose commit failed.
        failed: String,
        /// Failure detail.
        message: String,
    },

    // ==========================================================================
    // Participant Errors
    // ==========================================================================
    /// No participant is registered for a resource kind.
    #[error("no participant registered for {kind}")]
    ParticipantUnavailable {
        /// The kind without an owner.
        kind: ResourceKind,
    },

    /// A participant call failed.
    #[error("participant {participant} failed for transaction {txn_id}: {message}")]
    ParticipantFault {
        /// Participant name.
        participant: String,
        /// The transaction.
        txn_id: TxnId,
        /// Failure detail.
        message: String,
    },
}

impl TxnError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::InvalidTransaction { .. } => ErrorCode::InvalidTransaction,
            Self::TransactionAborted { .. } => ErrorCode::TransactionAborted,
            Self::PartialCommit { .. } => ErrorCode::PartialCommit,
            Self::ParticipantUnavailable { .. } => ErrorCode::ParticipantUnavailable,
            Self::ParticipantFault { .. } => ErrorCode::ParticipantFault,
        }
    }

    /// Returns true if the caller has to begin a new transaction.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::TransactionAborted { .. })
    }

    /// Returns true if the xid is unknown or already committed.
    #[must_use]
    pub const fn is_invalid_transaction(&self) -> bool {
        matches!(self, Self::InvalidTransaction { .. })
    }

    /// Returns the transaction this error is about, if any.
    #[must_use]
    pub const fn txn_id(&self) -> Option<TxnId> {
        match self {
            Self::InvalidTransaction { txn_id, .. }
            | Self::TransactionAborted { txn_id, .. }
            | Self::PartialCommit { txn_id, .. }
            | Self::ParticipantFault { txn_id, .. } => Some(*txn_id),
            _ => None,
        }
    }

    /// Creates an invalid transaction error.
    #[must_use]
    pub fn invalid(txn_id: TxnId, reason: impl Into<String>) -> Self {
        Self::InvalidTransaction {
            txn_id,
            reason: reason.into(),
        }
    }

    /// Creates a transaction aborted error.
    #[must_use]
    pub fn aborted(txn_id: TxnId, reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            txn_id,
            reason: reason.into(),
        }
    }

    /// Creates a participant fault.
    #[must_use]
    pub fn fault(participant: impl Into<String>, txn_id: TxnId, message: impl Into<String>) -> Self {
        Self::ParticipantFault {
            participant: participant.into(),
            txn_id,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = TxnError::invalid(TxnId::new(4), "no such transaction");
        assert_eq!(err.code(), ErrorCode::InvalidTransaction);
        assert_eq!(err.code().category(), "Transaction");
        assert_eq!(
            TxnError::ParticipantUnavailable {
                kind: ResourceKind::Car
            }
            .code()
            .category(),
            "Participant"
        );
    }

    #[test]
    fn test_every_code_is_produced() {
        let txn = TxnId::new(1);
        let codes: std::collections::HashSet<ErrorCode> = [
            TxnError::internal("bug"),
            TxnError::invalid_argument("bad"),
            TxnError::invalid(txn, "gone"),
            TxnError::aborted(txn, "deadlock"),
            TxnError::PartialCommit {
                txn_id: txn,
                committed: vec!["flights".to_string()],
                failed: "cars".to_string(),
                message: "refused".to_string(),
            },
            TxnError::ParticipantUnavailable {
                kind: ResourceKind::Room,
            },
            TxnError::fault("rooms", txn, "down"),
        ]
        .iter()
        .map(TxnError::code)
        .collect();

        let all = [
            ErrorCode::Internal,
            ErrorCode::InvalidArgument,
            ErrorCode::InvalidTransaction,
            ErrorCode::TransactionAborted,
            ErrorCode::PartialCommit,
            ErrorCode::ParticipantUnavailable,
            ErrorCode::ParticipantFault,
        ];
        assert_eq!(codes, all.into_iter().collect());
    }

    #[test]
    fn test_error_display() {
        let err = TxnError::aborted(TxnId::new(42), "deadlock");
        assert_eq!(err.to_string(), "transaction 42 has been aborted: deadlock");

        let err = TxnError::invalid(TxnId::new(3), "already committed");
        assert_eq!(err.to_string(), "transaction 3 is invalid: already committed");
    }

    #[test]
    fn test_taxonomy_is_distinguishable() {
        let aborted = TxnError::aborted(TxnId::new(1), "ttl expired");
        let invalid = TxnError::invalid(TxnId::new(1), "unknown");
        assert!(aborted.is_aborted());
        assert!(!aborted.is_invalid_transaction());
        assert!(invalid.is_invalid_transaction());
        assert!(!invalid.is_aborted());
        assert_ne!(aborted.code(), invalid.code());
    }

    #[test]
    fn test_txn_id_accessor() {
        assert_eq!(
            TxnError::fault("rooms", TxnId::new(9), "boom").txn_id(),
            Some(TxnId::new(9))
        );
        assert_eq!(TxnError::internal("x").txn_id(), None);
    }
}
