//! Exported record model and its JSON encoding
//!
//! One [`Record`] is produced per exported key and becomes one element of the
//! top-level JSON array:
//!
//! ```json
//! {"key":"user:1","type":"hash","value":{"name":"a"},"ttl":3600}
//! ```
//!
//! The `value` shape is fixed by the `type` tag, so it is modelled as the
//! [`KeyValue`] sum type instead of an untyped JSON value.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Store types the exporter knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    List,
    Set,
    Zset,
    Hash,
    Stream,
}

impl KeyType {
    /// Parse the type name reported by the store.
    ///
    /// Returns `None` for anything outside the supported set (module types,
    /// `none` for missing keys, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(KeyType::String),
            "list" => Some(KeyType::List),
            "set" => Some(KeyType::Set),
            "zset" => Some(KeyType::Zset),
            "hash" => Some(KeyType::Hash),
            "stream" => Some(KeyType::Stream),
            _ => None,
        }
    }

    /// Wire name used in the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::Zset => "zset",
            KeyType::Hash => "hash",
            KeyType::Stream => "stream",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member of a sorted set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMember {
    #[serde(rename = "Score", with = "score")]
    pub score: f64,
    #[serde(rename = "Member")]
    pub member: String,
}

/// Sorted-set scores may be `inf`/`-inf`, which JSON numbers cannot hold.
/// Finite scores stay numbers; the others are written as the strings the
/// store itself uses (`"inf"`, `"-inf"`).
mod score {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if score.is_finite() {
            serializer.serialize_f64(*score)
        } else {
            serializer.serialize_str(&score.to_string())
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match RawScore::deserialize(deserializer)? {
            RawScore::Number(n) => Ok(n),
            RawScore::Text(s) => s
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid score: {s}"))),
        }
    }
}

/// One entry of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Values")]
    pub values: BTreeMap<String, String>,
}

/// Type-tagged value of a key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    String(String),
    List(Vec<String>),
    Set(Vec<String>),
    Zset(Vec<ScoredMember>),
    Hash(BTreeMap<String, String>),
    Stream(Vec<StreamEntry>),
}

impl KeyValue {
    /// The type tag matching this value.
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyValue::String(_) => KeyType::String,
            KeyValue::List(_) => KeyType::List,
            KeyValue::Set(_) => KeyType::Set,
            KeyValue::Zset(_) => KeyType::Zset,
            KeyValue::Hash(_) => KeyType::Hash,
            KeyValue::Stream(_) => KeyType::Stream,
        }
    }

    fn serialize_payload<S: SerializeMap>(&self, map: &mut S) -> Result<(), S::Error> {
        match self {
            KeyValue::String(v) => map.serialize_entry("value", v),
            KeyValue::List(v) | KeyValue::Set(v) => map.serialize_entry("value", v),
            KeyValue::Zset(v) => map.serialize_entry("value", v),
            KeyValue::Hash(v) => map.serialize_entry("value", v),
            KeyValue::Stream(v) => map.serialize_entry("value", v),
        }
    }

    fn from_json(key_type: KeyType, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match key_type {
            KeyType::String => KeyValue::String(serde_json::from_value(value)?),
            KeyType::List => KeyValue::List(serde_json::from_value(value)?),
            KeyType::Set => KeyValue::Set(serde_json::from_value(value)?),
            KeyType::Zset => KeyValue::Zset(serde_json::from_value(value)?),
            KeyType::Hash => KeyValue::Hash(serde_json::from_value(value)?),
            KeyType::Stream => KeyValue::Stream(serde_json::from_value(value)?),
        })
    }
}

/// One exported key.
///
/// `ttl` is `Some` only when the key had a strictly positive remaining
/// lifetime at observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: KeyValue,
    pub ttl: Option<u64>,
}

impl Record {
    /// Create a record, normalising a raw remaining-lifetime reading.
    ///
    /// Store sentinels (`-1` no expiry, `-2` missing key) and zero all map to
    /// no `ttl` field.
    pub fn new(key: impl Into<String>, value: KeyValue, ttl_seconds: i64) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: u64::try_from(ttl_seconds).ok().filter(|secs| *secs > 0),
        }
    }

    /// Type tag of the record's value.
    pub fn key_type(&self) -> KeyType {
        self.value.key_type()
    }

    /// Encode as one compact JSON object.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.ttl.is_some() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("key", &self.key)?;
        map.serialize_entry("type", self.key_type().as_str())?;
        self.value.serialize_payload(&mut map)?;
        if let Some(ttl) = self.ttl {
            map.serialize_entry("ttl", &ttl)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct RawRecord {
    key: String,
    #[serde(rename = "type")]
    key_type: KeyType,
    value: serde_json::Value,
    #[serde(default)]
    ttl: Option<u64>,
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRecord::deserialize(deserializer)?;
        let value = KeyValue::from_json(raw.key_type, raw.value).map_err(D::Error::custom)?;
        Ok(Record {
            key: raw.key,
            value,
            ttl: raw.ttl.filter(|secs| *secs > 0),
        })
    }
}
