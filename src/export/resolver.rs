//! Per-key resolution: type, value and remaining lifetime
//!
//! Resolution failures are scoped to the key being resolved. They are
//! reported as [`KeyError`] and never abort an export run.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{ExportError, Result};
use crate::source::DataSource;

use super::record::{KeyType, KeyValue, Record};

/// The fetch step a key failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveStage {
    Type,
    Value,
    Ttl,
}

impl fmt::Display for ResolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveStage::Type => f.write_str("type"),
            ResolveStage::Value => f.write_str("value"),
            ResolveStage::Ttl => f.write_str("TTL"),
        }
    }
}

/// Why a key could not be resolved.
#[derive(Debug)]
pub enum KeyErrorKind {
    /// A store call failed.
    Fetch {
        stage: ResolveStage,
        cause: ExportError,
    },

    /// The store reported a type the exporter cannot encode.
    UnsupportedType(String),

    /// The key was deleted between enumeration and resolution.
    Vanished,
}

/// Key-scoped resolution failure.
#[derive(Debug)]
pub struct KeyError {
    pub key: String,
    pub kind: KeyErrorKind,
}

impl KeyError {
    fn fetch(key: &str, stage: ResolveStage, cause: ExportError) -> Self {
        Self {
            key: key.to_string(),
            kind: KeyErrorKind::Fetch { stage, cause },
        }
    }

    /// The step that failed.
    pub fn stage(&self) -> ResolveStage {
        match &self.kind {
            KeyErrorKind::Fetch { stage, .. } => *stage,
            KeyErrorKind::UnsupportedType(_) => ResolveStage::Value,
            KeyErrorKind::Vanished => ResolveStage::Type,
        }
    }

    /// Whether the key simply disappeared before it could be read.
    pub fn is_vanished(&self) -> bool {
        matches!(self.kind, KeyErrorKind::Vanished)
    }
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            KeyErrorKind::Fetch { stage, cause } => {
                write!(f, "failed to get {stage} for key {}: {cause}", self.key)
            }
            KeyErrorKind::UnsupportedType(name) => write!(
                f,
                "failed to get value for key {}: unsupported key type: {name}",
                self.key
            ),
            KeyErrorKind::Vanished => write!(f, "key {} no longer exists", self.key),
        }
    }
}

impl std::error::Error for KeyError {}

/// Resolves keys into [`Record`]s against a shared data source.
#[derive(Clone)]
pub struct KeyResolver {
    source: Arc<dyn DataSource>,
}

impl KeyResolver {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// Resolve one key.
    ///
    /// Fetches the type, then the value through the per-type fetcher, then the
    /// remaining lifetime. The three calls run sequentially and any failure
    /// drops the key.
    ///
    /// # Arguments
    /// * `key` - Key name as returned by enumeration
    ///
    /// # Returns
    /// * `Result<Record, KeyError>` - The record, or the key-scoped failure
    pub async fn resolve(&self, key: &str) -> std::result::Result<Record, KeyError> {
        let type_name = self
            .source
            .key_type(key)
            .await
            .map_err(|e| KeyError::fetch(key, ResolveStage::Type, e))?;

        let key_type = match KeyType::parse(&type_name) {
            Some(key_type) => key_type,
            None if type_name == "none" => {
                return Err(KeyError {
                    key: key.to_string(),
                    kind: KeyErrorKind::Vanished,
                });
            }
            None => {
                return Err(KeyError {
                    key: key.to_string(),
                    kind: KeyErrorKind::UnsupportedType(type_name),
                });
            }
        };

        let value = self
            .fetch_value(key, key_type)
            .await
            .map_err(|e| KeyError::fetch(key, ResolveStage::Value, e))?;

        let ttl = self
            .source
            .ttl(key)
            .await
            .map_err(|e| KeyError::fetch(key, ResolveStage::Ttl, e))?;

        trace!(key = %key, key_type = %key_type, ttl, "Resolved key");
        Ok(Record::new(key, value, ttl))
    }

    async fn fetch_value(&self, key: &str, key_type: KeyType) -> Result<KeyValue> {
        let value = match key_type {
            KeyType::String => KeyValue::String(self.source.get_string(key).await?),
            KeyType::List => KeyValue::List(self.source.get_list(key).await?),
            KeyType::Set => KeyValue::Set(self.source.get_set(key).await?),
            KeyType::Zset => KeyValue::Zset(self.source.get_sorted_set(key).await?),
            KeyType::Hash => KeyValue::Hash(self.source.get_hash(key).await?),
            KeyType::Stream => KeyValue::Stream(self.source.get_stream(key).await?),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::export::record::{ScoredMember, StreamEntry};
    use crate::source::MemorySource;

    fn resolver(source: MemorySource) -> KeyResolver {
        KeyResolver::new(Arc::new(source))
    }

    #[tokio::test]
    async fn test_resolve_string_with_ttl() {
        let source = MemorySource::new().with_key(
            "test:key",
            KeyValue::String("test value".into()),
            3600,
        );
        let record = resolver(source).resolve("test:key").await.unwrap();
        assert_eq!(record.key, "test:key");
        assert_eq!(record.key_type(), KeyType::String);
        assert_eq!(record.value, KeyValue::String("test value".into()));
        assert_eq!(record.ttl, Some(3600));
    }

    #[tokio::test]
    async fn test_resolve_every_supported_type() {
        let mut hash = BTreeMap::new();
        hash.insert("field1".to_string(), "value1".to_string());
        let mut entry = BTreeMap::new();
        entry.insert("f".to_string(), "v".to_string());

        let source = MemorySource::new()
            .with_key("l", KeyValue::List(vec!["item1".into(), "item2".into()]), -1)
            .with_key("s", KeyValue::Set(vec!["member1".into()]), -1)
            .with_key(
                "z",
                KeyValue::Zset(vec![ScoredMember {
                    score: 2.0,
                    member: "member2".into(),
                }]),
                -1,
            )
            .with_key("h", KeyValue::Hash(hash.clone()), -1)
            .with_key(
                "x",
                KeyValue::Stream(vec![StreamEntry {
                    id: "1-0".into(),
                    values: entry,
                }]),
                -1,
            );
        let resolver = resolver(source);

        for (key, expected) in [
            ("l", KeyType::List),
            ("s", KeyType::Set),
            ("z", KeyType::Zset),
            ("h", KeyType::Hash),
            ("x", KeyType::Stream),
        ] {
            let record = resolver.resolve(key).await.unwrap();
            assert_eq!(record.key_type(), expected);
            assert_eq!(record.ttl, None);
        }
        let record = resolver.resolve("h").await.unwrap();
        assert_eq!(record.value, KeyValue::Hash(hash));
    }

    #[tokio::test]
    async fn test_unsupported_type_is_an_error() {
        let source = MemorySource::new().with_raw_type("json:doc", "ReJSON-RL");
        let err = resolver(source).resolve("json:doc").await.unwrap_err();
        assert_eq!(err.key, "json:doc");
        assert!(matches!(err.kind, KeyErrorKind::UnsupportedType(ref t) if t == "ReJSON-RL"));
        let msg = err.to_string();
        assert!(msg.contains("unsupported key type: ReJSON-RL"));
    }

    #[tokio::test]
    async fn test_vanished_key() {
        let err = resolver(MemorySource::new()).resolve("gone").await.unwrap_err();
        assert!(err.is_vanished());
        assert_eq!(err.stage(), ResolveStage::Type);
    }

    #[tokio::test]
    async fn test_each_stage_failure_is_key_scoped() {
        for stage in [ResolveStage::Type, ResolveStage::Value, ResolveStage::Ttl] {
            let source = MemorySource::new()
                .with_string("k", "v")
                .fail_on("k", stage);
            let err = resolver(source).resolve("k").await.unwrap_err();
            assert_eq!(err.stage(), stage);
            assert!(err.to_string().contains("for key k"));
        }
    }

    #[tokio::test]
    async fn test_non_positive_ttl_is_omitted() {
        let source = MemorySource::new()
            .with_key("persistent", KeyValue::String("a".into()), -1)
            .with_key("expiring", KeyValue::String("b".into()), 0);
        let resolver = resolver(source);
        assert_eq!(resolver.resolve("persistent").await.unwrap().ttl, None);
        assert_eq!(resolver.resolve("expiring").await.unwrap().ttl, None);
    }
}
