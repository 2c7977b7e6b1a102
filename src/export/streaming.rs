//! Cursor-based key enumeration for export runs
//!
//! Walks the keyspace one page at a time without ever holding more than a
//! single page of key names, and feeds them into the bounded key queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::source::DataSource;

/// Lazy, finite, non-restartable sequence of key pages.
///
/// Pages are requested with a cursor; a returned cursor of `0` means the
/// keyspace is exhausted. A failed page also ends the sequence: enumeration
/// cannot safely skip a page and resume.
pub struct KeyScanner {
    source: Arc<dyn DataSource>,
    cursor: u64,
    page_size: usize,
    pages_fetched: u64,
    keys_fetched: u64,
    exhausted: bool,
}

impl KeyScanner {
    /// Create a new scanner
    ///
    /// # Arguments
    /// * `source` - Store to enumerate
    /// * `page_size` - Page-size hint passed with each request
    pub fn new(source: Arc<dyn DataSource>, page_size: usize) -> Self {
        Self {
            source,
            cursor: 0,
            page_size: page_size.max(1),
            pages_fetched: 0,
            keys_fetched: 0,
            exhausted: false,
        }
    }

    /// Fetch the next non-empty page of keys.
    ///
    /// Stores may return empty pages with a non-zero cursor; those are
    /// skipped transparently.
    ///
    /// # Returns
    /// * `Result<Option<Vec<String>>>` - Next page, or None once exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>> {
        while !self.exhausted {
            let page = match self.source.scan(self.cursor, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            };

            self.pages_fetched += 1;
            self.cursor = page.cursor;
            if page.cursor == 0 {
                self.exhausted = true;
            }

            if page.keys.is_empty() {
                continue;
            }

            self.keys_fetched += page.keys.len() as u64;
            debug!(
                "Fetched page #{} with {} keys (total: {})",
                self.pages_fetched,
                page.keys.len(),
                self.keys_fetched
            );
            return Ok(Some(page.keys));
        }

        Ok(None)
    }

    /// Feed every key into `keys_tx` until exhaustion or cancellation.
    ///
    /// Cancellation is checked before each page is requested and while
    /// waiting for room in the queue. Dropping `keys_tx` on return closes the
    /// queue for the workers.
    ///
    /// # Returns
    /// * `Result<u64>` - Number of keys enqueued
    pub async fn feed(
        mut self,
        keys_tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<u64> {
        let mut enqueued = 0u64;

        loop {
            if cancel.is_cancelled() {
                debug!("Key enumeration stopped after {} keys", enqueued);
                return Ok(enqueued);
            }

            let keys = match self.next_page().await? {
                Some(keys) => keys,
                None => break,
            };

            for key in keys {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Key enumeration stopped after {} keys", enqueued);
                        return Ok(enqueued);
                    }
                    sent = keys_tx.send(key) => {
                        if sent.is_err() {
                            debug!("Key queue closed, stopping enumeration");
                            return Ok(enqueued);
                        }
                        enqueued += 1;
                    }
                }
            }
        }

        info!(
            "Key enumeration finished: {} keys in {} pages",
            enqueued, self.pages_fetched
        );
        Ok(enqueued)
    }
}
