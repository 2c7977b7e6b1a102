//! Redis-backed data source
//!
//! Keeps a small round-robin pool of multiplexed async connections. Each
//! multiplexed connection pipelines concurrent requests, so a handful of them
//! is enough to keep many workers busy.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamRangeReply;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Value};
use tracing::{debug, error};

use crate::config::SourceConfig;
use crate::error::{ExportError, Result, SourceError};
use crate::export::{ScoredMember, StreamEntry};

use super::{DataSource, ScanPage};

const DEFAULT_PORT: u16 = 6379;

/// Data source reading from a Redis server.
pub struct RedisSource {
    connections: Vec<MultiplexedConnection>,
    next: AtomicUsize,
    address: String,
}

impl RedisSource {
    /// Open `pool_size` connections to the configured server.
    ///
    /// Selects the configured database and authenticates with the configured
    /// password as part of the connection handshake.
    ///
    /// # Arguments
    /// * `config` - Source configuration (address, credentials, timeouts)
    /// * `pool_size` - Number of multiplexed connections to open
    pub async fn connect(config: &SourceConfig, pool_size: usize) -> Result<Self> {
        let (host, port) = parse_address(&config.address)?;
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: config.password.clone(),
                ..Default::default()
            },
        };

        let client = redis::Client::open(info)
            .map_err(|e| SourceError::ConnectFailed(e.to_string()))?;

        let response_timeout = Duration::from_secs(config.response_timeout);
        let connect_timeout = Duration::from_secs(config.connect_timeout);

        let pool_size = pool_size.max(1);
        let mut connections = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = client
                .get_multiplexed_async_connection_with_timeouts(response_timeout, connect_timeout)
                .await
                .map_err(|e| {
                    SourceError::ConnectFailed(format!("{}: {}", config.address, e))
                })?;
            connections.push(conn);
        }

        debug!(
            "Opened {} connection(s) to {} (db {})",
            connections.len(),
            config.address,
            config.db
        );

        let source = Self {
            connections,
            next: AtomicUsize::new(0),
            address: config.address.clone(),
        };
        source.set_client_name().await;

        Ok(source)
    }

    /// Check the server is answering.
    ///
    /// # Returns
    /// * `Result<String>` - The server's reply (normally `PONG`)
    pub async fn ping(&self) -> Result<String> {
        let mut conn = self.connection();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| SourceError::PingFailed(e.to_string()))?;
        Ok(reply)
    }

    /// Server address this source is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Name every pooled connection so operators can spot them in `CLIENT LIST`.
    async fn set_client_name(&self) {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let name = client_name(&host);

        for conn in &self.connections {
            let mut conn = conn.clone();
            let result: redis::RedisResult<()> = redis::cmd("CLIENT")
                .arg("SETNAME")
                .arg(&name)
                .query_async(&mut conn)
                .await;
            if let Err(e) = result {
                debug!("CLIENT SETNAME rejected: {}", e);
                return;
            }
        }
    }

    fn connection(&self) -> MultiplexedConnection {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[idx].clone()
    }
}

#[async_trait]
impl DataSource for RedisSource {
    async fn scan(&self, cursor: u64, count: usize) -> Result<ScanPage> {
        let mut conn = self.connection();
        let reply: Value = redis::cmd("SCAN")
            .arg(cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| SourceError::ScanFailed {
                cursor,
                message: e.to_string(),
            })?;
        let page = decode_scan_reply(&reply).map_err(|e| SourceError::ScanFailed {
            cursor,
            message: e.to_string(),
        })?;
        Ok(page)
    }

    async fn key_type(&self, key: &str) -> Result<String> {
        let mut conn = self.connection();
        let name: String = redis::cmd("TYPE").arg(key).query_async(&mut conn).await?;
        Ok(name)
    }

    async fn get_string(&self, key: &str) -> Result<String> {
        let mut conn = self.connection();
        let raw: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        raw.map(lossy)
            .ok_or_else(|| ExportError::Generic(format!("key {key} no longer exists")))
    }

    async fn get_list(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let raw: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(raw.into_iter().map(lossy).collect())
    }

    async fn get_set(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let raw: Vec<Vec<u8>> = redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await?;
        Ok(raw.into_iter().map(lossy).collect())
    }

    async fn get_sorted_set(&self, key: &str) -> Result<Vec<ScoredMember>> {
        let mut conn = self.connection();
        let raw: Vec<(Vec<u8>, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        Ok(raw
            .into_iter()
            .map(|(member, score)| ScoredMember {
                score,
                member: lossy(member),
            })
            .collect())
    }

    async fn get_hash(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let mut conn = self.connection();
        let raw: Vec<(Vec<u8>, Vec<u8>)> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(raw
            .into_iter()
            .map(|(field, value)| (lossy(field), lossy(value)))
            .collect())
    }

    async fn get_stream(&self, key: &str) -> Result<Vec<StreamEntry>> {
        let mut conn = self.connection();
        let reply: StreamRangeReply = redis::cmd("XRANGE")
            .arg(key)
            .arg("-")
            .arg("+")
            .query_async(&mut conn)
            .await?;

        let mut entries = Vec::with_capacity(reply.ids.len());
        for entry in reply.ids {
            let mut values = BTreeMap::new();
            for (field, value) in entry.map {
                let raw: Vec<u8> = redis::from_redis_value(&value)?;
                values.insert(field, lossy(raw));
            }
            entries.push(StreamEntry {
                id: entry.id,
                values,
            });
        }
        Ok(entries)
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.connection();
        let secs: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(secs)
    }
}

/// Decode a `SCAN` reply into a page of keys.
///
/// Key names are binary-safe in the store but must be UTF-8 here: a name is
/// passed back verbatim to every later command. Names that are not UTF-8 are
/// logged and skipped; the rest of the page is kept.
fn decode_scan_reply(reply: &Value) -> redis::RedisResult<ScanPage> {
    let (cursor, raw): (u64, Vec<Vec<u8>>) = redis::from_redis_value(reply)?;

    let mut keys = Vec::with_capacity(raw.len());
    for name in raw {
        match String::from_utf8(name) {
            Ok(key) => keys.push(key),
            Err(e) => {
                let shown = String::from_utf8_lossy(e.as_bytes());
                error!(key = %shown, "Skipping key with a non-UTF-8 name");
            }
        }
    }

    Ok(ScanPage { cursor, keys })
}

/// Split `host[:port]` into its parts, accepting bracketed IPv6 literals.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16)> {
    let address = address.trim();
    if address.is_empty() {
        return Err(SourceError::InvalidAddress(address.to_string()).into());
    }

    let invalid = || SourceError::InvalidAddress(address.to_string());

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None if tail.is_empty() => DEFAULT_PORT,
            None => return Err(invalid().into()),
        };
        return Ok((host.to_string(), port));
    }

    match address.matches(':').count() {
        0 => Ok((address.to_string(), DEFAULT_PORT)),
        1 => {
            let (host, port) = address.split_once(':').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid().into());
            }
            let port = port.parse().map_err(|_| invalid())?;
            Ok((host.to_string(), port))
        }
        // Bare IPv6 literal
        _ => Ok((address.to_string(), DEFAULT_PORT)),
    }
}

/// Connection name announced to the server; names may not contain spaces.
fn client_name(host: &str) -> String {
    let host: String = host
        .chars()
        .map(|c| if c.is_ascii_graphic() { c } else { '-' })
        .collect();
    format!("redis-export-{host}")
}

fn lossy(raw: Vec<u8>) -> String {
    match String::from_utf8(raw) {
        Ok(s) => s,
        Err(e) => {
            let s = String::from_utf8_lossy(e.as_bytes()).into_owned();
            debug!("Replaced invalid UTF-8 in value ({} bytes)", s.len());
            s
        }
    }
}
