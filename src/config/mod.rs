//! Configuration management for redis-export
//!
//! This module handles loading, parsing, and validating configuration:
//! - Configuration file (TOML format)
//! - Command-line arguments (applied by the CLI layer)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Store connection configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Export run configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Server address as `host:port`
    #[serde(default = "default_address")]
    pub address: String,

    /// Password sent with AUTH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database index
    #[serde(default)]
    pub db: i64,

    /// Connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub connect_timeout: u64,

    /// Per-command response timeout in seconds
    #[serde(default = "default_timeout")]
    pub response_timeout: u64,

    /// Number of multiplexed connections (None: derived from workers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
}

/// Export run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// Output file path
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Number of resolver workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Scan page hint and capacity of both queues
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between progress reports
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Show a spinner on stderr
    #[serde(default)]
    pub progress_bar: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Immutable settings for one export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Number of resolver workers
    pub workers: usize,
    /// Scan page hint and queue capacity
    pub batch_size: usize,
    /// Time between progress reports
    pub progress_interval: Duration,
    /// Show a spinner on stderr
    pub progress_bar: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: default_batch_size(),
            progress_interval: Duration::from_secs(default_progress_interval()),
            progress_bar: false,
        }
    }
}

// Default value functions
fn default_address() -> String {
    "localhost:6379".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_output() -> PathBuf {
    PathBuf::from("redis_export.json")
}

/// Twice the available parallelism, the usual sweet spot for I/O-bound workers
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        * 2
}

fn default_batch_size() -> usize {
    1000
}

fn default_progress_interval() -> u64 {
    5
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            password: None,
            db: 0,
            connect_timeout: default_timeout(),
            response_timeout: default_timeout(),
            pool_size: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            progress_bar: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// With no explicit path the default location is tried, and a missing
    /// default file yields the default configuration. An explicit path that
    /// does not exist is an error.
    ///
    /// # Arguments
    /// * `path` - Optional path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Generic(e.to_string()).into())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - `~/.redis-export/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".redis-export")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error naming the first bad field otherwise
    pub fn validate(&self) -> Result<()> {
        if self.source.address.trim().is_empty() {
            return Err(invalid("source.address", &self.source.address));
        }
        if self.source.db < 0 {
            return Err(invalid("source.db", self.source.db));
        }
        if self.source.connect_timeout == 0 {
            return Err(invalid("source.connect_timeout", 0));
        }
        if self.source.response_timeout == 0 {
            return Err(invalid("source.response_timeout", 0));
        }
        if self.source.pool_size == Some(0) {
            return Err(invalid("source.pool_size", 0));
        }
        if self.export.workers == 0 {
            return Err(invalid("export.workers", 0));
        }
        if self.export.batch_size == 0 {
            return Err(invalid("export.batch_size", 0));
        }
        if self.export.progress_interval == 0 {
            return Err(invalid("export.progress_interval", 0));
        }
        if self.export.output.as_os_str().is_empty() {
            return Err(invalid("export.output", ""));
        }
        Ok(())
    }

    /// Options handed to the export coordinator
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            workers: self.export.workers,
            batch_size: self.export.batch_size,
            progress_interval: Duration::from_secs(self.export.progress_interval),
            progress_bar: self.export.progress_bar,
        }
    }

    /// Number of store connections to open
    pub fn pool_size(&self) -> usize {
        self.source
            .pool_size
            .unwrap_or_else(|| self.export.workers.min(8))
            .max(1)
    }
}

fn invalid(field: &str, value: impl ToString) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse a level name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "error" | "fatal" | "panic" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}
