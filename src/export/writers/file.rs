//! File sink for export output

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{Result, SinkError};

use super::{OutputSink, create_writer, validate_path};

/// Buffered sink writing to a local file.
pub struct FileSink {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Bytes accepted so far
    written: u64,
}

impl FileSink {
    /// Create (or truncate) the output file
    ///
    /// # Arguments
    /// * `path` - Output file path
    ///
    /// # Returns
    /// * `Result<Self>` - New sink or error
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        validate_path(path)?;
        let writer = create_writer(path).await?;

        debug!("Created output file: {}", path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutputSink for FileSink {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.writer
            .write_all(buf)
            .await
            .map_err(|e| SinkError::WriteFailed(format!("{}: {}", self.path.display(), e)))?;
        self.written += buf.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| SinkError::CloseFailed(format!("{}: {}", self.path.display(), e)))?;
        self.writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| SinkError::CloseFailed(format!("{}: {}", self.path.display(), e)))?;

        debug!(
            "Closed output file: {} ({} bytes)",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
