//! # tandem-server
//!
//! Operator front end for the Tandem coordinator.
//!
//! - **Config**: [`ServerConfig`], loaded from TOML and overridden by flags
//! - **Shell**: the line-oriented command language, parsed into [`Command`]
//!   and executed against a [`Coordinator`](tandem_coordinator::Coordinator)
//! - **Repl**: the interactive loop used by the `tandemd` binary
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tandem_common::config::CoordinatorConfig;
//! use tandem_coordinator::Coordinator;
//! use tandem_server::{Reply, Shell};
//!
//! let tm = Coordinator::in_process(CoordinatorConfig::default()).unwrap();
//! let shell = Shell::new(Arc::new(tm));
//! assert_eq!(shell.execute_line("start"), Reply::Output("xid 1".to_string()));
//! assert_eq!(shell.execute_line("add-rooms 1 NYC 5 100"), Reply::Output("true".to_string()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Server configuration.
pub mod config;

/// Interactive loop.
pub mod repl;

/// Command parsing and execution.
pub mod shell;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use repl::Repl;
pub use shell::{Command, ParseError, Reply, Shell};
