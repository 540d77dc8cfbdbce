//! # tandem-common
//!
//! Common types, errors, and configuration for Tandem.
//!
//! This crate provides the foundational types shared by the lock manager,
//! the resource managers and the coordinator:
//!
//! - **Types**: transaction and customer identifiers, resource keys
//! - **Errors**: the transactional error taxonomy `TxnError`
//! - **Config**: coordinator configuration
//! - **Constants**: default lifetimes and limits
//!
//! ## Example
//!
//! ```rust
//! use tandem_common::types::{room_key, TxnId};
//! use tandem_common::error::{TxnError, TxnResult};
//!
//! fn example(txn: TxnId) -> TxnResult<String> {
//!     if !txn.is_valid() {
//!         return Err(TxnError::invalid(txn, "sentinel id"));
//!     }
//!     Ok(room_key("NYC"))
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::CoordinatorConfig;
pub use constants::*;
pub use error::{ErrorCode, TxnError, TxnResult};
pub use types::{CustomerId, ResourceKind, TxnId};
