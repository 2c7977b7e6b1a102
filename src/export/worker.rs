//! Worker pool resolving keys in parallel
//!
//! `W` tasks share one bounded key queue; whichever worker is idle takes the
//! next key. Resolved records go to the bounded result queue. Key-scoped
//! failures are logged and skipped, so one bad key never stops a worker.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::Result;

use super::record::Record;
use super::resolver::KeyResolver;

/// Per-worker (or pool-wide, once summed) outcome counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Keys resolved and handed to the writer
    pub resolved: u64,
    /// Keys dropped because of a key-scoped failure
    pub failed: u64,
}

impl WorkerStats {
    fn merge(self, other: WorkerStats) -> WorkerStats {
        WorkerStats {
            resolved: self.resolved + other.resolved,
            failed: self.failed + other.failed,
        }
    }
}

/// Fixed-size pool of resolver tasks.
pub struct WorkerPool {
    resolver: KeyResolver,
    workers: usize,
}

impl WorkerPool {
    pub fn new(resolver: KeyResolver, workers: usize) -> Self {
        Self {
            resolver,
            workers: workers.max(1),
        }
    }

    /// Start every worker.
    ///
    /// Each worker owns a clone of `results_tx`, so the result queue closes
    /// exactly when the last worker exits.
    ///
    /// # Arguments
    /// * `keys_rx` - Shared bounded key queue
    /// * `results_tx` - Bounded result queue feeding the writer
    /// * `cancel` - Checked before each key is taken
    pub fn spawn(
        &self,
        keys_rx: mpsc::Receiver<String>,
        results_tx: mpsc::Sender<Record>,
        cancel: CancellationToken,
    ) -> PoolHandle {
        let keys_rx = Arc::new(Mutex::new(keys_rx));

        let handles = (0..self.workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    self.resolver.clone(),
                    keys_rx.clone(),
                    results_tx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        PoolHandle { handles }
    }
}

/// Handle over the running workers.
pub struct PoolHandle {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl PoolHandle {
    /// Wait for every worker to exit and sum their counters.
    pub async fn join(self) -> Result<WorkerStats> {
        let mut total = WorkerStats::default();
        for joined in futures::future::join_all(self.handles).await {
            total = total.merge(joined?);
        }
        Ok(total)
    }
}

async fn next_key(keys: &Mutex<mpsc::Receiver<String>>) -> Option<String> {
    keys.lock().await.recv().await
}

async fn run_worker(
    id: usize,
    resolver: KeyResolver,
    keys: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<Record>,
    cancel: CancellationToken,
) -> WorkerStats {
    debug!("Worker {} started", id);
    let mut stats = WorkerStats::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            key = next_key(&keys) => key,
        };
        let Some(key) = next else {
            break;
        };

        match resolver.resolve(&key).await {
            Ok(record) => {
                let delivered = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    sent = results.send(record) => sent.is_ok(),
                };
                if !delivered {
                    break;
                }
                stats.resolved += 1;
            }
            Err(e) if e.is_vanished() => {
                warn!(key = %e.key, "Skipping key: {}", e);
                stats.failed += 1;
            }
            Err(e) => {
                error!(key = %e.key, "Error processing key: {}", e);
                stats.failed += 1;
            }
        }
    }

    debug!(
        "Worker {} finished ({} resolved, {} failed)",
        id, stats.resolved, stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::export::resolver::ResolveStage;
    use crate::source::MemorySource;

    fn pool(source: MemorySource, workers: usize) -> WorkerPool {
        WorkerPool::new(KeyResolver::new(Arc::new(source)), workers)
    }

    #[tokio::test]
    async fn test_pool_resolves_every_key_once() {
        let source = (0..50).fold(MemorySource::new(), |src, i| {
            src.with_string(format!("k{i}"), "v")
        });
        let pool = pool(source, 4);

        let (keys_tx, keys_rx) = mpsc::channel(8);
        let (results_tx, mut results_rx) = mpsc::channel(8);
        let handle = pool.spawn(keys_rx, results_tx, CancellationToken::new());

        let feeder = tokio::spawn(async move {
            for i in 0..50 {
                keys_tx.send(format!("k{i}")).await.unwrap();
            }
        });

        let mut seen = HashSet::new();
        while let Some(record) = results_rx.recv().await {
            assert!(seen.insert(record.key));
        }
        feeder.await.unwrap();

        let stats = handle.join().await.unwrap();
        assert_eq!(seen.len(), 50);
        assert_eq!(stats, WorkerStats { resolved: 50, failed: 0 });
    }

    #[tokio::test]
    async fn test_failed_keys_are_skipped() {
        let source = MemorySource::new()
            .with_string("good", "v")
            .with_string("bad-ttl", "v")
            .with_raw_type("module", "MBbloom--")
            .fail_on("bad-ttl", ResolveStage::Ttl);
        let pool = pool(source, 2);

        let (keys_tx, keys_rx) = mpsc::channel(4);
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let handle = pool.spawn(keys_rx, results_tx, CancellationToken::new());

        for key in ["good", "bad-ttl", "module", "missing"] {
            keys_tx.send(key.to_string()).await.unwrap();
        }
        drop(keys_tx);

        let mut keys = Vec::new();
        while let Some(record) = results_rx.recv().await {
            keys.push(record.key);
        }
        let stats = handle.join().await.unwrap();

        assert_eq!(keys, vec!["good".to_string()]);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.failed, 3);
    }

    // Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl LogBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_unsupported_type_logs_one_error() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        // Current-thread runtime: every worker runs on this thread.
        let _guard = tracing::subscriber::set_default(subscriber);

        let source = MemorySource::new()
            .with_string("plain", "v")
            .with_raw_type("json:doc", "ReJSON-RL");
        let pool = pool(source, 2);

        let (keys_tx, keys_rx) = mpsc::channel(4);
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let handle = pool.spawn(keys_rx, results_tx, CancellationToken::new());

        keys_tx.send("plain".to_string()).await.unwrap();
        keys_tx.send("json:doc".to_string()).await.unwrap();
        drop(keys_tx);

        let mut exported = Vec::new();
        while let Some(record) = results_rx.recv().await {
            exported.push(record.key);
        }
        let stats = handle.join().await.unwrap();

        assert_eq!(exported, vec!["plain".to_string()]);
        assert_eq!(stats.failed, 1);

        let errors: Vec<String> = logs
            .lines()
            .into_iter()
            .filter(|line| line.contains("ERROR"))
            .collect();
        assert_eq!(errors.len(), 1, "unexpected error lines: {errors:?}");
        assert!(errors[0].contains("json:doc"));
        assert!(errors[0].contains("ReJSON-RL"));
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_workers() {
        let pool = pool(MemorySource::new(), 3);
        let (_keys_tx, keys_rx) = mpsc::channel::<String>(4);
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = pool.spawn(keys_rx, results_tx, cancel.clone());

        cancel.cancel();
        let stats = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("workers did not stop")
            .unwrap();
        assert_eq!(stats, WorkerStats::default());
        assert!(results_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_workers_waiting_on_full_results() {
        let source = (0..10).fold(MemorySource::new(), |src, i| {
            src.with_string(format!("k{i}"), "v")
        });
        let pool = pool(source, 2);
        let (keys_tx, keys_rx) = mpsc::channel(16);
        let (results_tx, _results_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = pool.spawn(keys_rx, results_tx, cancel.clone());

        for i in 0..10 {
            keys_tx.send(format!("k{i}")).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("workers did not stop")
            .unwrap();
        assert_eq!(stats.resolved, 1);
    }
}
