//! In-memory data source
//!
//! A deterministic store for tests and dry runs. Keys are enumerated in
//! lexical order, the scan cursor is the index of the next key, and failures
//! or latency can be injected per key or per page.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ExportError, Result, SourceError};
use crate::export::{KeyValue, ResolveStage, ScoredMember, StreamEntry};

use super::{DataSource, ScanPage};

#[derive(Debug, Clone)]
struct StoredKey {
    type_name: String,
    value: Option<KeyValue>,
    ttl: i64,
}

/// Data source backed by an ordered in-process map.
#[derive(Debug, Default)]
pub struct MemorySource {
    keys: BTreeMap<String, StoredKey>,
    failures: HashMap<String, ResolveStage>,
    scan_failure_page: Option<usize>,
    latency: Option<Duration>,
    scan_calls: AtomicUsize,
    scanned: AtomicU64,
}

impl MemorySource {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key with a typed value.
    ///
    /// # Arguments
    /// * `key` - Key name
    /// * `value` - Value; its variant decides the reported type
    /// * `ttl` - Raw remaining lifetime (`-1` for no expiry)
    pub fn with_key(mut self, key: impl Into<String>, value: KeyValue, ttl: i64) -> Self {
        let type_name = value.key_type().as_str().to_string();
        self.keys.insert(
            key.into(),
            StoredKey {
                type_name,
                value: Some(value),
                ttl,
            },
        );
        self
    }

    /// Add a persistent string key.
    pub fn with_string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_key(key, KeyValue::String(value.into()), -1)
    }

    /// Add a key whose type the exporter cannot handle (e.g. a module type).
    pub fn with_raw_type(mut self, key: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.keys.insert(
            key.into(),
            StoredKey {
                type_name: type_name.into(),
                value: None,
                ttl: -1,
            },
        );
        self
    }

    /// Make one resolution stage fail for `key`.
    pub fn fail_on(mut self, key: impl Into<String>, stage: ResolveStage) -> Self {
        self.failures.insert(key.into(), stage);
        self
    }

    /// Make the `page`-th scan call (zero based) fail.
    pub fn fail_scan_at(mut self, page: usize) -> Self {
        self.scan_failure_page = Some(page);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Total number of keys handed out by `scan` so far.
    pub fn scanned_keys(&self) -> u64 {
        self.scanned.load(Ordering::SeqCst)
    }

    /// Number of keys in the store.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(&self, key: &str, stage: ResolveStage) -> Result<()> {
        match self.failures.get(key) {
            Some(failing) if *failing == stage => Err(ExportError::Generic(format!(
                "injected {stage} failure for {key}"
            ))),
            _ => Ok(()),
        }
    }

    fn value(&self, key: &str) -> Result<&KeyValue> {
        self.check(key, ResolveStage::Value)?;
        self.keys
            .get(key)
            .and_then(|stored| stored.value.as_ref())
            .ok_or_else(|| ExportError::Generic(format!("key {key} no longer exists")))
    }
}

fn wrong_type() -> ExportError {
    ExportError::Generic(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    )
}

#[async_trait]
impl DataSource for MemorySource {
    async fn scan(&self, cursor: u64, count: usize) -> Result<ScanPage> {
        self.pause().await;

        let page = self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if self.scan_failure_page == Some(page) {
            return Err(SourceError::ScanFailed {
                cursor,
                message: format!("injected failure on page {page}"),
            }
            .into());
        }

        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(self.keys.len());
        let keys: Vec<String> = self
            .keys
            .keys()
            .skip(start)
            .take(count.max(1))
            .cloned()
            .collect();
        let end = start + keys.len();
        let next = if end >= self.keys.len() { 0 } else { end as u64 };

        self.scanned.fetch_add(keys.len() as u64, Ordering::SeqCst);
        Ok(ScanPage { cursor: next, keys })
    }

    async fn key_type(&self, key: &str) -> Result<String> {
        self.pause().await;
        self.check(key, ResolveStage::Type)?;
        Ok(self
            .keys
            .get(key)
            .map(|stored| stored.type_name.clone())
            .unwrap_or_else(|| "none".to_string()))
    }

    async fn get_string(&self, key: &str) -> Result<String> {
        match self.value(key)? {
            KeyValue::String(v) => Ok(v.clone()),
            _ => Err(wrong_type()),
        }
    }

    async fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.value(key)? {
            KeyValue::List(v) => Ok(v.clone()),
            _ => Err(wrong_type()),
        }
    }

    async fn get_set(&self, key: &str) -> Result<Vec<String>> {
        match self.value(key)? {
            KeyValue::Set(v) => Ok(v.clone()),
            _ => Err(wrong_type()),
        }
    }

    async fn get_sorted_set(&self, key: &str) -> Result<Vec<ScoredMember>> {
        match self.value(key)? {
            KeyValue::Zset(v) => Ok(v.clone()),
            _ => Err(wrong_type()),
        }
    }

    async fn get_hash(&self, key: &str) -> Result<BTreeMap<String, String>> {
        match self.value(key)? {
            KeyValue::Hash(v) => Ok(v.clone()),
            _ => Err(wrong_type()),
        }
    }

    async fn get_stream(&self, key: &str) -> Result<Vec<StreamEntry>> {
        match self.value(key)? {
            KeyValue::Stream(v) => Ok(v.clone()),
            _ => Err(wrong_type()),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        self.check(key, ResolveStage::Ttl)?;
        Ok(self.keys.get(key).map(|stored| stored.ttl).unwrap_or(-2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(n: usize) -> MemorySource {
        (0..n).fold(MemorySource::new(), |src, i| {
            src.with_string(format!("key:{i:03}"), format!("v{i}"))
        })
    }

    #[tokio::test]
    async fn test_scan_paginates_until_cursor_zero() {
        let src = source(5);
        let first = src.scan(0, 2).await.unwrap();
        assert_eq!(first.keys, vec!["key:000", "key:001"]);
        assert_eq!(first.cursor, 2);

        let second = src.scan(first.cursor, 2).await.unwrap();
        let third = src.scan(second.cursor, 2).await.unwrap();
        assert_eq!(third.keys, vec!["key:004"]);
        assert_eq!(third.cursor, 0);
        assert_eq!(src.scanned_keys(), 5);
    }

    #[tokio::test]
    async fn test_empty_store_scan() {
        let src = MemorySource::new();
        let page = src.scan(0, 10).await.unwrap();
        assert!(page.keys.is_empty());
        assert_eq!(page.cursor, 0);
    }

    #[tokio::test]
    async fn test_injected_scan_failure() {
        let src = source(4).fail_scan_at(1);
        assert!(src.scan(0, 2).await.is_ok());
        let err = src.scan(2, 2).await.unwrap_err();
        assert!(matches!(err, ExportError::Source(SourceError::ScanFailed { cursor: 2, .. })));
    }

    #[tokio::test]
    async fn test_missing_key_sentinels() {
        let src = MemorySource::new();
        assert_eq!(src.key_type("gone").await.unwrap(), "none");
        assert_eq!(src.ttl("gone").await.unwrap(), -2);
        assert!(src.get_string("gone").await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_type_fetch() {
        let src = MemorySource::new().with_string("s", "v");
        assert!(src.get_list("s").await.is_err());
        assert_eq!(src.get_string("s").await.unwrap(), "v");
    }
}
