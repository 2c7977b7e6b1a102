//! Redis Export Library
//!
//! Streams every key of a Redis database into a single JSON array while
//! keeping memory bounded. The binary is a thin wrapper; the pipeline can be
//! driven directly from this library against any [`source::DataSource`].
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Enumeration, resolution, writing and coordination
//! - `source`: Data sources (Redis and in-memory)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use redis_export::{Config, ExportCoordinator, FileSink, RedisSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let source = RedisSource::connect(&config.source, config.pool_size()).await?;
//!     let sink = FileSink::create(&config.export.output).await?;
//!
//!     let mut coordinator =
//!         ExportCoordinator::new(Arc::new(source), Box::new(sink), config.export_options());
//!     let summary = coordinator.execute().await?;
//!     println!("Exported {} keys", summary.keys_exported);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod source;

// Re-export commonly used types
pub use config::{Config, ExportOptions};
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, ExportSummary, FileSink, Record, RunState};
pub use source::{DataSource, MemorySource, RedisSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
