//! Export coordinator for orchestrating export runs
//!
//! Wires the pipeline together and owns its lifecycle:
//!
//! ```text
//! KeyScanner ─► key queue ─► WorkerPool (W) ─► result queue ─► JsonArrayWriter ─► sink
//!               (bounded)                       (bounded)       │
//!                                                               └─► ProgressTracker ◄── monitor
//! ```
//!
//! Both queues hold at most `batch_size` items, which bounds memory no matter
//! how large the keyspace is.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExportOptions;
use crate::error::{ExportError, Result};
use crate::source::DataSource;

use super::progress::ProgressTracker;
use super::record::Record;
use super::resolver::KeyResolver;
use super::streaming::KeyScanner;
use super::worker::WorkerPool;
use super::writers::{JsonArrayWriter, OutputSink};

/// Lifecycle of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a completed export run
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Final state (always `Completed` when returned from `execute`)
    pub state: RunState,
    /// Keys handed out by enumeration
    pub keys_scanned: u64,
    /// Records written to the output
    pub keys_exported: u64,
    /// Keys dropped because of key-scoped failures
    pub keys_failed: u64,
    /// Output size in bytes
    pub bytes_written: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Local time the run started
    pub started_at: DateTime<Local>,
}

impl ExportSummary {
    /// Average throughput over the whole run
    pub fn keys_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.keys_exported as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinator for export runs
///
/// Each coordinator runs exactly once; state never resumes.
pub struct ExportCoordinator {
    /// Store to export
    source: Arc<dyn DataSource>,
    /// Output stream, taken by the writer when the run starts
    sink: Option<Box<dyn OutputSink>>,
    /// Immutable run options
    options: ExportOptions,
    /// Cancellation token for aborting the run
    cancel_token: CancellationToken,
    /// Current lifecycle state
    state: RunState,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    ///
    /// # Arguments
    /// * `source` - Data source to enumerate and read
    /// * `sink` - Opened output stream
    /// * `options` - Worker count, queue capacity and progress settings
    pub fn new(
        source: Arc<dyn DataSource>,
        sink: Box<dyn OutputSink>,
        options: ExportOptions,
    ) -> Self {
        Self {
            source,
            sink: Some(sink),
            options,
            cancel_token: CancellationToken::new(),
            state: RunState::Idle,
        }
    }

    /// Set cancellation token for this export run
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!("Export state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Execute the export run
    ///
    /// Starts the enumerator, the worker pool and the progress monitor, then
    /// drains the result queue into the writer on the calling task.
    ///
    /// # Returns
    /// * `Ok(ExportSummary)` - The run reached `Completed`
    /// * `Err(ExportError::Cancelled)` - Cancelled; the array was closed with
    ///   whatever had been written
    /// * `Err(_)` - A fatal error; the output is left as last flushed
    pub async fn execute(&mut self) -> Result<ExportSummary> {
        let sink = self
            .sink
            .take()
            .ok_or_else(|| ExportError::Internal("export run already executed".to_string()))?;

        let started_at = Local::now();
        let start_time = Instant::now();
        let workers = self.options.workers.max(1);
        let batch_size = self.options.batch_size.max(1);

        self.transition(RunState::Running);
        info!(
            output_file = %sink.describe(),
            workers,
            batch_size,
            "Starting export"
        );

        // Fatal errors cancel `abort` without touching the caller's token.
        let abort = self.cancel_token.child_token();

        let progress = ProgressTracker::new(self.options.progress_bar);
        let monitor_stop = CancellationToken::new();
        let monitor = progress.spawn_monitor(self.options.progress_interval, monitor_stop.clone());

        let (keys_tx, keys_rx) = mpsc::channel::<String>(batch_size);
        let (results_tx, mut results_rx) = mpsc::channel::<Record>(batch_size);

        let scanner = KeyScanner::new(self.source.clone(), batch_size);
        let enumerator = {
            let abort = abort.clone();
            tokio::spawn(async move {
                let result = scanner.feed(keys_tx, abort.clone()).await;
                if let Err(ref e) = result {
                    error!("Error during key scanning: {}", e);
                    abort.cancel();
                }
                result
            })
        };

        let pool = WorkerPool::new(KeyResolver::new(self.source.clone()), workers).spawn(
            keys_rx,
            results_tx,
            abort.clone(),
        );

        let mut writer = JsonArrayWriter::new(sink, progress.clone());
        let drained = drain_results(&mut writer, &mut results_rx, &abort).await;
        if drained.is_err() {
            abort.cancel();
        }
        drop(results_rx);

        let enumerated = enumerator.await;
        let pool_stats = pool.join().await;
        monitor_stop.cancel();
        if let Err(e) = monitor.await {
            warn!("Progress monitor stopped abnormally: {}", e);
        }
        progress.finish();

        // Writer failures win over enumeration failures, which win over cancellation.
        let outcome = drained
            .and_then(|()| enumerated.map_err(ExportError::from).and_then(|r| r))
            .and_then(|scanned| pool_stats.map(|stats| (scanned, stats)));

        let (keys_scanned, stats) = match outcome {
            Ok(counts) => counts,
            Err(e) => {
                self.transition(RunState::Failed);
                if let Err(close_err) = writer.abandon().await {
                    warn!("Failed to close output after error: {}", close_err);
                }
                error!(exported = writer.written(), "Export failed: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = writer.finish().await {
            self.transition(RunState::Failed);
            error!("Export failed: {}", e);
            return Err(e);
        }

        let elapsed = start_time.elapsed();

        if self.cancel_token.is_cancelled() {
            self.transition(RunState::Cancelled);
            info!(
                exported_keys = writer.written(),
                skipped_keys = stats.failed,
                elapsed = ?Duration::from_secs(elapsed.as_secs()),
                "Export cancelled"
            );
            return Err(ExportError::Cancelled {
                exported: writer.written(),
            });
        }

        self.transition(RunState::Completed);
        let summary = ExportSummary {
            state: self.state,
            keys_scanned,
            keys_exported: writer.written(),
            keys_failed: stats.failed,
            bytes_written: writer.bytes_written(),
            elapsed,
            started_at,
        };

        info!(
            total_keys = summary.keys_exported,
            skipped_keys = summary.keys_failed,
            total_duration = ?Duration::from_secs(elapsed.as_secs()),
            avg_keys_per_sec = summary.keys_per_sec(),
            "Export completed successfully"
        );

        Ok(summary)
    }
}

/// Write results until the queue closes or the run is aborted.
///
/// Records still queued when the run is aborted are discarded.
async fn drain_results(
    writer: &mut JsonArrayWriter,
    results_rx: &mut mpsc::Receiver<Record>,
    abort: &CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = abort.cancelled() => return Ok(()),
            next = results_rx.recv() => match next {
                Some(record) => {
                    writer.write_record(&record).await?;
                }
                None => return Ok(()),
            },
        }
    }
}
