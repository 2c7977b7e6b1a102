use std::fmt;

use redis::ErrorKind;
use serde::{Deserialize, Serialize};

/// Structured error information extracted from Redis driver errors.
///
/// Serialized to compact JSON so a failure reads as one log line.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Format Redis errors as compact JSON wrapped in an `error` field.
///
/// Used by the parent module's `Display` implementation for `ExportError::Redis`.
pub fn format_redis_error(f: &mut fmt::Formatter<'_>, error: &redis::RedisError) -> fmt::Result {
    let info = extract_error_info(error);
    let wrapper = serde_json::json!({ "error": info });
    let json_output = serde_json::to_string(&wrapper).map_err(|_| fmt::Error)?;
    write!(f, "{json_output}")
}

/// Extract structured information from a Redis error using the driver API.
pub fn extract_error_info(error: &redis::RedisError) -> ErrorInfo {
    let mut info = ErrorInfo {
        code: error.code().map(str::to_string),
        ..ErrorInfo::default()
    };

    let error_type = if error.is_timeout() {
        "redis.timeout"
    } else if error.is_connection_refusal() {
        "redis.connection_refused"
    } else {
        match error.kind() {
            ErrorKind::AuthenticationFailed => "redis.authentication_error",
            ErrorKind::TypeError => "redis.type_error",
            ErrorKind::ResponseError => "redis.response_error",
            ErrorKind::BusyLoadingError => "redis.busy_loading",
            ErrorKind::IoError => "redis.io_error",
            ErrorKind::InvalidClientConfig => "redis.invalid_config",
            ErrorKind::ClientError => "redis.client_error",
            _ => "redis.error",
        }
    };
    info.error_type = Some(error_type.to_string());

    info.message = Some(
        error
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    );

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_info() {
        let err = redis::RedisError::from((
            ErrorKind::TypeError,
            "Response was of incompatible type",
        ));
        let info = extract_error_info(&err);
        assert_eq!(info.error_type.as_deref(), Some("redis.type_error"));
        assert!(info.message.is_some());
    }

    #[test]
    fn test_response_error_keeps_detail() {
        let err = redis::RedisError::from((
            ErrorKind::ResponseError,
            "An error was signalled by the server",
            "WRONGTYPE Operation against a key".to_string(),
        ));
        let info = extract_error_info(&err);
        assert_eq!(info.error_type.as_deref(), Some("redis.response_error"));
        assert_eq!(info.message.as_deref(), Some("WRONGTYPE Operation against a key"));
    }

    #[test]
    fn test_compact_json_is_single_line() {
        let err = redis::RedisError::from((ErrorKind::IoError, "broken pipe"));
        let json = extract_error_info(&err).to_json_compact().unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("redis.io_error"));
    }
}
