//! Output sinks and the JSON array writer
//!
//! An [`OutputSink`] is an append-only byte stream (a file, or memory in
//! tests). [`JsonArrayWriter`] is the single writer that frames records as
//! elements of one top-level JSON array on top of a sink.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{Result, SinkError};

pub mod file;
pub mod json;
pub mod memory;

pub use file::FileSink;
pub use json::JsonArrayWriter;
pub use memory::MemorySink;

/// Append-only output stream.
#[async_trait]
pub trait OutputSink: Send {
    /// Append bytes to the stream
    ///
    /// # Arguments
    /// * `buf` - Bytes to append
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    async fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush buffered bytes and close the stream
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    async fn close(&mut self) -> Result<()>;

    /// Bytes accepted so far
    fn bytes_written(&self) -> u64;

    /// Human-readable destination, for logs
    fn describe(&self) -> String;
}

/// Helper function to create a buffered file writer
///
/// # Arguments
/// * `path` - File path to create (truncated if it exists)
///
/// # Returns
/// * `Result<BufWriter<File>>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).await.map_err(|e| SinkError::OpenFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(BufWriter::with_capacity(8 * 1024 * 1024, file)) // 8MB buffer
}

/// Helper function to validate file path and directory
///
/// # Arguments
/// * `path` - File path to validate
///
/// # Returns
/// * `Result<()>` - Success or error
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(SinkError::OpenFailed {
                path: path.display().to_string(),
                message: format!("directory does not exist: {}", parent.display()),
            }
            .into());
        }
    }

    if path.is_dir() {
        return Err(SinkError::OpenFailed {
            path: path.display().to_string(),
            message: "path is a directory".to_string(),
        }
        .into());
    }

    Ok(())
}
