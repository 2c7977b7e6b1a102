//! In-memory sink, used by tests to inspect output and simulate slow or
//! failing destinations.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{Result, SinkError};

use super::OutputSink;

/// Sink appending into a shared byte buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    written: u64,
    writes: usize,
    fail_after: Option<usize>,
    gate: Option<Arc<Semaphore>>,
    closed: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write after the first `writes` succeed.
    pub fn fail_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }

    /// Make every write wait for a permit from `gate`.
    ///
    /// Closing the semaphore releases all waiting and future writes.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Snapshot of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Contents decoded as UTF-8.
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Whether `close` has been called on any clone of this sink.
    pub fn is_closed(&self) -> bool {
        self.closed.lock().map(|c| *c).unwrap_or(false)
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if let Some(limit) = self.fail_after {
            if self.writes >= limit {
                return Err(SinkError::WriteFailed("no space left on device".to_string()).into());
            }
        }

        self.buffer
            .lock()
            .map_err(|_| SinkError::WriteFailed("buffer poisoned".to_string()))?
            .extend_from_slice(buf);
        self.writes += 1;
        self.written += buf.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
