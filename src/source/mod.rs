//! Data source abstraction for export runs
//!
//! The export pipeline never talks to a store directly. It sees a
//! [`DataSource`], which exposes exactly what an export needs:
//! - cursor-based key enumeration (`scan`)
//! - type lookup (`key_type`)
//! - one value fetcher per supported type
//! - remaining lifetime lookup (`ttl`)
//!
//! [`RedisSource`] is the production implementation; [`MemorySource`] is a
//! deterministic in-process store used by tests.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::export::{ScoredMember, StreamEntry};

pub mod memory;
pub mod redis;

pub use memory::MemorySource;
pub use self::redis::RedisSource;

/// One page of a cursor-based key enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` once the keyspace is exhausted.
    pub cursor: u64,
    /// Keys returned by this call, possibly empty.
    pub keys: Vec<String>,
}

/// Read access to a key-value store.
///
/// Implementations must be shareable across tasks: the enumerator and every
/// worker hold the same `Arc<dyn DataSource>`.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch one page of keys starting at `cursor`.
    ///
    /// # Arguments
    /// * `cursor` - Opaque continuation token, `0` for the first call
    /// * `count` - Page-size hint
    async fn scan(&self, cursor: u64, count: usize) -> Result<ScanPage>;

    /// Raw type name of a key as reported by the store.
    async fn key_type(&self, key: &str) -> Result<String>;

    async fn get_string(&self, key: &str) -> Result<String>;

    async fn get_list(&self, key: &str) -> Result<Vec<String>>;

    async fn get_set(&self, key: &str) -> Result<Vec<String>>;

    async fn get_sorted_set(&self, key: &str) -> Result<Vec<ScoredMember>>;

    async fn get_hash(&self, key: &str) -> Result<BTreeMap<String, String>>;

    async fn get_stream(&self, key: &str) -> Result<Vec<StreamEntry>>;

    /// Remaining lifetime in whole seconds.
    ///
    /// Uses the store's sentinels: `-1` when the key has no expiry and `-2`
    /// when the key no longer exists.
    async fn ttl(&self, key: &str) -> Result<i64>;
}
