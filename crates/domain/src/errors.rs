//! Error types surfaced by the transport core

use thiserror::Error;

use crate::impl_label_conversions;

/// The single error value a resource-layer caller receives per logical
/// operation.
///
/// Retry and backoff decisions never produce one of these on their own; only
/// terminal outcomes escape the transport.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Object not found: {url}")]
    ObjectNotFound { url: String },

    #[error("Rate limited: status {status_code} persisted after {attempts} attempts")]
    RateLimited { status_code: u16, attempts: u32, body: String },

    #[error("API error {status_code}: {body}")]
    Api { status_code: u16, body: String },

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, status_code: Option<u16>, last: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of failures used for logging and by callers that
/// branch on the failure family instead of the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Timeouts, resets, refused connections
    TransientNetwork,
    /// 429 / 503
    ServerThrottled,
    /// Retryable 400/409/428 contention signal
    ServerConflict,
    /// Session expired; refreshed once and retried
    AuthExpired,
    /// Authentication failed after a fresh session
    AuthRejected,
    /// Non-retryable 4xx
    ClientError,
    /// Non-retryable 5xx
    ServerFault,
    /// Attempt ceiling reached
    ExhaustedRetries,
    Cancelled,
    Configuration,
    Internal,
}

impl_label_conversions!(ErrorKind {
    TransientNetwork => "transient_network",
    ServerThrottled => "server_throttled",
    ServerConflict => "server_conflict",
    AuthExpired => "auth_expired",
    AuthRejected => "auth_rejected",
    ClientError => "client_error",
    ServerFault => "server_fault",
    ExhaustedRetries => "exhausted_retries",
    Cancelled => "cancelled",
    Configuration => "configuration",
    Internal => "internal",
});

impl SdkError {
    /// Map this error onto its failure family.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::TransientNetwork,
            Self::NotAuthenticated(_) => ErrorKind::AuthRejected,
            Self::ObjectNotFound { .. } => ErrorKind::ClientError,
            Self::RateLimited { .. } => ErrorKind::ServerThrottled,
            Self::Api { status_code, .. } if *status_code >= 500 => ErrorKind::ServerFault,
            Self::Api { .. } => ErrorKind::ClientError,
            Self::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) | Self::Credentials(_) => ErrorKind::Configuration,
            Self::Serialization(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status attached to this error, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited { status_code, .. } | Self::Api { status_code, .. } => {
                Some(*status_code)
            }
            Self::ObjectNotFound { .. } => Some(404),
            Self::ExhaustedRetries { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for zsdk operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(SdkError::Network("reset".into()).kind(), ErrorKind::TransientNetwork);
        assert_eq!(
            SdkError::RateLimited { status_code: 429, attempts: 3, body: String::new() }.kind(),
            ErrorKind::ServerThrottled
        );
        assert_eq!(
            SdkError::Api { status_code: 400, body: String::new() }.kind(),
            ErrorKind::ClientError
        );
        assert_eq!(
            SdkError::Api { status_code: 501, body: String::new() }.kind(),
            ErrorKind::ServerFault
        );
        assert_eq!(SdkError::NotAuthenticated("x".into()).kind(), ErrorKind::AuthRejected);
    }

    #[test]
    fn test_status_code_is_exposed() {
        let err = SdkError::ExhaustedRetries {
            attempts: 100,
            status_code: Some(409),
            last: "EDIT_LOCK_NOT_AVAILABLE".into(),
        };
        assert_eq!(err.status_code(), Some(409));
        assert_eq!(SdkError::ObjectNotFound { url: "/x".into() }.status_code(), Some(404));
        assert_eq!(SdkError::Cancelled.status_code(), None);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::ServerConflict.to_string(), "server_conflict");
        assert_eq!("AUTH_EXPIRED".parse::<ErrorKind>(), Ok(ErrorKind::AuthExpired));
    }
}
