use std::{fmt, io};

use crate::error::redis::format_redis_error;

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export runs.
///
/// Every variant is run-fatal. Failures scoped to a single key are carried by
/// [`crate::export::KeyError`] instead and never become an `ExportError`.
#[derive(Debug)]
pub enum ExportError {
    /// Data source errors (connection, key enumeration).
    Source(SourceError),

    /// Output sink errors.
    Sink(SinkError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// Redis driver errors.
    Redis(redis::RedisError),

    /// JSON serialization errors.
    Json(serde_json::Error),

    /// The run was cancelled before completion.
    Cancelled { exported: u64 },

    /// A pipeline task panicked or was aborted.
    Internal(String),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Data source errors.
#[derive(Debug)]
pub enum SourceError {
    /// Failed to establish a connection.
    ConnectFailed(String),

    /// Invalid server address.
    InvalidAddress(String),

    /// Ping command failed.
    PingFailed(String),

    /// Fetching a page of keys failed.
    ScanFailed { cursor: u64, message: String },
}

/// Output sink errors.
#[derive(Debug)]
pub enum SinkError {
    /// The output stream could not be created.
    OpenFailed { path: String, message: String },

    /// Writing to the output stream failed.
    WriteFailed(String),

    /// Flushing or closing the output stream failed.
    CloseFailed(String),
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Generic configuration error.
    Generic(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Source(e) => write!(f, "Source error: {e}"),
            ExportError::Sink(e) => write!(f, "Output error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Redis(e) => format_redis_error(f, e),
            ExportError::Json(e) => write!(f, "JSON error: {e}"),
            ExportError::Cancelled { exported } => {
                write!(f, "Export cancelled after {exported} keys")
            }
            ExportError::Internal(msg) => write!(f, "Internal error: {msg}"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::ConnectFailed(msg) => write!(f, "Failed to connect: {msg}"),
            SourceError::InvalidAddress(addr) => write!(f, "Invalid server address: {addr}"),
            SourceError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
            SourceError::ScanFailed { cursor, message } => {
                write!(f, "Key enumeration failed at cursor {cursor}: {message}")
            }
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::OpenFailed { path, message } => {
                write!(f, "Failed to create output file {path}: {message}")
            }
            SinkError::WriteFailed(msg) => write!(f, "Failed to write output: {msg}"),
            SinkError::CloseFailed(msg) => write!(f, "Failed to close output: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            ExportError::Redis(e) => Some(e),
            ExportError::Json(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for SourceError {}
impl std::error::Error for SinkError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<redis::RedisError> for ExportError {
    fn from(err: redis::RedisError) -> Self {
        ExportError::Redis(err)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err)
    }
}

impl From<SourceError> for ExportError {
    fn from(err: SourceError) -> Self {
        ExportError::Source(err)
    }
}

impl From<SinkError> for ExportError {
    fn from(err: SinkError) -> Self {
        ExportError::Sink(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<tokio::task::JoinError> for ExportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ExportError::Internal(format!("pipeline task failed: {err}"))
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}

impl ExportError {
    /// Whether this error is the cancellation outcome rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_names_enumeration() {
        let err: ExportError = SourceError::ScanFailed {
            cursor: 0,
            message: "connection reset".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("Key enumeration failed"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_cancelled_display() {
        let err = ExportError::Cancelled { exported: 42 };
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Export cancelled after 42 keys");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ExportError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, ExportError::Io(_)));
        assert!(!err.is_cancelled());
    }
}
