//! Progress tracking for export runs
//!
//! The writer bumps a shared counter after each element it commits; the
//! monitor task samples that counter on a fixed interval and reports count,
//! elapsed time and throughput. Sampling never blocks the pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Records written so far
    pub processed: u64,
    /// Time since the run started
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Average throughput since start.
    pub fn keys_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Shared progress counter with an optional terminal spinner.
#[derive(Clone)]
pub struct ProgressTracker {
    /// Number of records written so far
    processed: Arc<AtomicU64>,
    /// Start time of the run
    start_time: Instant,
    /// Spinner (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner on stderr
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} {pos} keys {msg}")
            {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });

        Self {
            processed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Record one committed element.
    ///
    /// # Returns
    /// * `u64` - Count after the increment
    pub fn increment(&self) -> u64 {
        let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref bar) = self.bar {
            bar.set_position(count);
        }
        count
    }

    /// Records written so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Current count and elapsed time
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed(),
            elapsed: self.start_time.elapsed(),
        }
    }

    /// Report progress every `interval` until `stop` fires.
    ///
    /// # Returns
    /// * `JoinHandle<u64>` - Resolves to the number of reports emitted
    pub fn spawn_monitor(&self, interval: Duration, stop: CancellationToken) -> JoinHandle<u64> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            let mut reports = 0u64;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        tracker.report();
                        reports += 1;
                    }
                }
            }

            reports
        })
    }

    fn report(&self) {
        let snapshot = self.snapshot();
        let rate = snapshot.keys_per_sec();

        info!(
            processed_keys = snapshot.processed,
            keys_per_sec = rate,
            elapsed = ?Duration::from_secs(snapshot.elapsed.as_secs()),
            "Export progress"
        );

        if let Some(ref bar) = self.bar {
            bar.set_message(format!("({rate:.0} keys/sec)"));
        }
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_snapshot() {
        let tracker = ProgressTracker::new(false);
        assert_eq!(tracker.increment(), 1);
        assert_eq!(tracker.increment(), 2);

        let clone = tracker.clone();
        clone.increment();
        assert_eq!(tracker.snapshot().processed, 3);
    }

    #[test]
    fn test_keys_per_sec() {
        let snapshot = ProgressSnapshot {
            processed: 500,
            elapsed: Duration::from_secs(10),
        };
        assert_eq!(snapshot.keys_per_sec(), 50.0);

        let start = ProgressSnapshot {
            processed: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(start.keys_per_sec(), 0.0);
    }

    #[tokio::test]
    async fn test_monitor_reports_until_stopped() {
        let tracker = ProgressTracker::new(false);
        let stop = CancellationToken::new();
        let handle = tracker.spawn_monitor(Duration::from_millis(10), stop.clone());

        tokio::time::sleep(Duration::from_millis(60)).await;
        stop.cancel();

        let reports = handle.await.unwrap();
        assert!(reports >= 1);
    }

    #[tokio::test]
    async fn test_monitor_does_not_report_before_first_interval() {
        let tracker = ProgressTracker::new(false);
        let stop = CancellationToken::new();
        let handle = tracker.spawn_monitor(Duration::from_secs(3600), stop.clone());

        stop.cancel();
        assert_eq!(handle.await.unwrap(), 0);
    }
}
