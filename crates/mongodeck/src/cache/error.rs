//! Connection cache error types

use std::time::Duration;

use thiserror::Error;

/// Failure to materialize a client for a connection.
///
/// Cloneable because a single construction attempt is shared by every caller
/// that raced on the same connection id; each of them receives the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),

    #[error("Client construction failed: {0}")]
    Internal(String),
}

impl ConnectError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout(_))
    }

    #[must_use]
    pub const fn is_refused(&self) -> bool {
        matches!(self, Self::ConnectionRefused(_))
    }

    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailure(_))
    }

    /// Short label used for metrics and structured logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectTimeout(_) => "timeout",
            Self::ConnectionRefused(_) => "refused",
            Self::AuthFailure(_) => "auth",
            Self::InvalidTarget(_) => "invalid_target",
            Self::Internal(_) => "internal",
        }
    }
}

/// Failure while tearing a client down. Logged, never surfaced to callers.
#[derive(Error, Debug)]
#[error("Failed to close client: {0}")]
pub struct CloseError(pub String);

/// Result type for client construction
pub type ConnectResult<T> = Result<T, ConnectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ConnectError::ConnectTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
        assert!(err.is_timeout());
        assert!(!err.is_refused());
    }

    #[test]
    fn test_refused_predicate() {
        let err = ConnectError::ConnectionRefused("127.0.0.1:27017".to_string());
        assert!(err.is_refused());
        assert!(!err.is_auth_failure());
        assert!(err.to_string().contains("127.0.0.1:27017"));
    }

    #[test]
    fn test_auth_failure_predicate() {
        let err = ConnectError::AuthFailure("bad credentials".to_string());
        assert!(err.is_auth_failure());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            ConnectError::ConnectTimeout(Duration::from_secs(1)).kind(),
            "timeout"
        );
        assert_eq!(ConnectError::ConnectionRefused(String::new()).kind(), "refused");
        assert_eq!(ConnectError::AuthFailure(String::new()).kind(), "auth");
        assert_eq!(
            ConnectError::InvalidTarget(String::new()).kind(),
            "invalid_target"
        );
        assert_eq!(ConnectError::Internal(String::new()).kind(), "internal");
    }

    #[test]
    fn test_clone_preserves_equality() {
        let err = ConnectError::ConnectionRefused("down".to_string());
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_close_error_display() {
        let err = CloseError("socket reset".to_string());
        assert!(err.to_string().contains("socket reset"));
    }
}
