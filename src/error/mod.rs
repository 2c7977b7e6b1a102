//! Error handling module for export runs.
//!
//! This module provides:
//! - A single run-fatal error type ([`ExportError`]) with specific kinds for
//!   the data source, the output sink and configuration
//! - Structured formatting of Redis driver errors
//!
//! Key-scoped resolution failures live in [`crate::export::KeyError`]; they are
//! logged and skipped and never cross into this module's types.
//!
//! # Example
//!
//! ```rust,no_run
//! use redis_export::error::{ExportError, Result, SinkError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(SinkError::WriteFailed("disk full".to_string()).into())
//! }
//!
//! match example_operation() {
//!     Err(ExportError::Sink(e)) => eprintln!("{e}"),
//!     _ => {}
//! }
//! ```

pub mod kinds;
pub mod redis;

// Re-export commonly used types
pub use kinds::{ConfigError, ExportError, Result, SinkError, SourceError};
pub use self::redis::{ErrorInfo, extract_error_info};
