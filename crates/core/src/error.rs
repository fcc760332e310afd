//! Unified error types for tether.
//!
//! Every failure that leaves the request pipeline is one of these variants.
//! Transport-native errors are normalized into `Network`, `Timeout` or
//! `Cancelled` before they reach the caller.

use serde_json::Value;

/// Discriminant of [`Error`], for matching without destructuring payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Network,
    Validation,
    ResponseStatus,
    Configuration,
    Cancelled,
    Hook,
}

/// Unified error type for the tether client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// An attempt exceeded its deadline.
    #[error("TIMEOUT: request exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport-level failure not otherwise classified.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Response payload did not match the configured schema.
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    /// Non-success HTTP status. Carries the decoded body.
    #[error("RESPONSE_STATUS: {status} {status_text}")]
    ResponseStatus { status: u16, status_text: String, body: Value },

    /// Invalid client or call configuration (unknown validator, bad URL).
    #[error("CONFIGURATION_ERROR: {0}")]
    Configuration(String),

    /// The caller aborted the request.
    #[error("CANCELLED: {0}")]
    Cancelled(String),

    /// Raised by a user interceptor or transformer.
    #[error("HOOK_ERROR: {0}")]
    Hook(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Network(_) => ErrorKind::Network,
            Error::Validation(_) => ErrorKind::Validation,
            Error::ResponseStatus { .. } => ErrorKind::ResponseStatus,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Hook(_) => ErrorKind::Hook,
        }
    }

    /// Whether the default retry classification treats this error as transient.
    ///
    /// Only network failures and timeouts qualify.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Timeout)
    }

    /// HTTP status for `ResponseStatus` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ResponseStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Timeout { timeout_ms: 250 };
        assert!(err.to_string().contains("TIMEOUT"));
        assert!(err.to_string().contains("250ms"));

        let err = Error::ResponseStatus { status: 503, status_text: "Service Unavailable".into(), body: Value::Null };
        assert_eq!(err.to_string(), "RESPONSE_STATUS: 503 Service Unavailable");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::Network("reset".into()).kind(), ErrorKind::Network);
        assert_eq!(Error::Cancelled("req-1".into()).kind(), ErrorKind::Cancelled);
        assert_eq!(Error::Hook("boom".into()).kind(), ErrorKind::Hook);
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Network("reset".into()).is_transient());
        assert!(Error::Timeout { timeout_ms: 1 }.is_transient());
        assert!(!Error::Validation("bad".into()).is_transient());
        assert!(!Error::Configuration("bad".into()).is_transient());
        assert!(!Error::Cancelled("req".into()).is_transient());
        let status = Error::ResponseStatus { status: 503, status_text: String::new(), body: Value::Null };
        assert!(!status.is_transient());
        assert_eq!(status.status(), Some(503));
    }

    #[test]
    fn test_config_error_converts_to_configuration() {
        let err: Error = crate::config::ConfigError::Invalid { field: "timeout_ms".into(), reason: "zero".into() }.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("timeout_ms"));
    }
}
