//! Response classification
//!
//! Every response is classified exactly once, right after its body has been
//! read. Retry, backoff and error mapping all branch on the resulting
//! [`ResponseClass`] instead of re-inspecting status codes and body text.

use reqwest::StatusCode;
use serde_json::Value;
use zsdk_domain::ErrorKind;

/// Contention signals that providers report with a 4xx status but that clear
/// up on their own once a competing operation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictSignal {
    /// `EDIT_LOCK_NOT_AVAILABLE`: another admin session holds the edit lock
    EditLockNotAvailable,
    /// `CONCURRENT_ACCESS` or `api.concurrent.access.error`
    ConcurrentAccess,
    /// `SIMULTANEOUS_REQUEST`
    SimultaneousRequest,
    /// "Failed during enter Org barrier"
    OrgBarrier,
}

impl ConflictSignal {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "EDIT_LOCK_NOT_AVAILABLE" => Some(Self::EditLockNotAvailable),
            "CONCURRENT_ACCESS" | "api.concurrent.access.error" => Some(Self::ConcurrentAccess),
            "SIMULTANEOUS_REQUEST" => Some(Self::SimultaneousRequest),
            _ => None,
        }
    }

    fn from_message(message: &str) -> Option<Self> {
        message.contains("Failed during enter Org barrier").then_some(Self::OrgBarrier)
    }
}

/// What a received response means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 1xx-3xx
    Success,
    /// 429 or 503
    Throttled,
    /// 400/409/428 carrying a known contention signal
    Conflict(ConflictSignal),
    /// 401 or 403
    AuthRejected,
    NotFound,
    /// Any other 4xx
    ClientError,
    /// 5xx other than 501 and 503
    ServerError,
    /// 501: the operation will never succeed
    NotImplemented,
}

impl ResponseClass {
    /// Whether the transport should try the same request again.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Throttled | Self::Conflict(_) | Self::ServerError)
    }

    /// Whether the server asked us to slow down, so a `Retry-After` style
    /// hint may be present.
    pub const fn is_throttled(self) -> bool {
        matches!(self, Self::Throttled)
    }

    /// Failure family reported when the transport gives up on this class.
    pub const fn error_kind(self) -> Option<ErrorKind> {
        match self {
            Self::Success => None,
            Self::Throttled => Some(ErrorKind::ServerThrottled),
            Self::Conflict(_) => Some(ErrorKind::ServerConflict),
            Self::AuthRejected => Some(ErrorKind::AuthExpired),
            Self::NotFound | Self::ClientError => Some(ErrorKind::ClientError),
            Self::ServerError | Self::NotImplemented => Some(ErrorKind::ServerFault),
        }
    }
}

/// Classify a response from its status and raw body.
pub fn classify(status: StatusCode, body: &[u8]) -> ResponseClass {
    match status.as_u16() {
        100..=399 => ResponseClass::Success,
        429 | 503 => ResponseClass::Throttled,
        401 | 403 => ResponseClass::AuthRejected,
        404 => ResponseClass::NotFound,
        400 | 409 | 428 => {
            conflict_signal(body).map_or(ResponseClass::ClientError, ResponseClass::Conflict)
        }
        501 => ResponseClass::NotImplemented,
        500..=599 => ResponseClass::ServerError,
        _ => ResponseClass::ClientError,
    }
}

/// Look for a contention code in a JSON error body.
///
/// Providers put the code under `code` or `id` and the human text under
/// `message` or `reason`. Bodies that are not JSON never carry a signal.
fn conflict_signal(body: &[u8]) -> Option<ConflictSignal> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;

    let by_code = ["code", "id"]
        .iter()
        .filter_map(|field| object.get(*field).and_then(Value::as_str))
        .find_map(ConflictSignal::from_code);

    by_code.or_else(|| {
        ["message", "reason"]
            .iter()
            .filter_map(|field| object.get(*field).and_then(Value::as_str))
            .find_map(ConflictSignal::from_message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_throttle_and_auth_statuses() {
        assert_eq!(classify(status(429), b""), ResponseClass::Throttled);
        assert_eq!(classify(status(503), b""), ResponseClass::Throttled);
        assert_eq!(classify(status(401), b""), ResponseClass::AuthRejected);
        assert_eq!(classify(status(403), b""), ResponseClass::AuthRejected);
        assert_eq!(classify(status(404), b""), ResponseClass::NotFound);
    }

    #[test]
    fn test_retryable_classes_report_error_kind() {
        assert_eq!(classify(status(429), b"").error_kind(), Some(ErrorKind::ServerThrottled));
        assert_eq!(classify(status(502), b"").error_kind(), Some(ErrorKind::ServerFault));
        let body = br#"{"code":"EDIT_LOCK_NOT_AVAILABLE"}"#;
        assert_eq!(classify(status(409), body).error_kind(), Some(ErrorKind::ServerConflict));
    }

    #[test]
    fn test_conflict_codes_are_retryable() {
        let body = br#"{"code":"EDIT_LOCK_NOT_AVAILABLE","message":"Edit lock not available"}"#;
        let class = classify(status(409), body);
        assert_eq!(class, ResponseClass::Conflict(ConflictSignal::EditLockNotAvailable));
        assert!(class.is_retryable());

        let body = br#"{"id":"api.concurrent.access.error","reason":"busy"}"#;
        assert_eq!(
            classify(status(400), body),
            ResponseClass::Conflict(ConflictSignal::ConcurrentAccess)
        );

        let body = br#"{"code":"SIMULTANEOUS_REQUEST"}"#;
        assert_eq!(
            classify(status(428), body),
            ResponseClass::Conflict(ConflictSignal::SimultaneousRequest)
        );
    }

    #[test]
    fn test_org_barrier_message() {
        let body = br#"{"id":"internal","reason":"Failed during enter Org barrier"}"#;
        assert_eq!(
            classify(status(409), body),
            ResponseClass::Conflict(ConflictSignal::OrgBarrier)
        );
    }

    #[test]
    fn test_plain_bad_request_is_not_retryable() {
        let class = classify(status(400), br#"{"code":"INVALID_INPUT_ARGUMENT"}"#);
        assert_eq!(class, ResponseClass::ClientError);
        assert!(!class.is_retryable());

        // Conflict codes only count on contention statuses
        let class = classify(status(422), br#"{"code":"EDIT_LOCK_NOT_AVAILABLE"}"#);
        assert_eq!(class, ResponseClass::ClientError);

        assert_eq!(classify(status(409), b"not json"), ResponseClass::ClientError);
    }

    #[test]
    fn test_server_errors() {
        assert!(classify(status(500), b"").is_retryable());
        assert!(classify(status(502), b"").is_retryable());
        assert_eq!(classify(status(501), b""), ResponseClass::NotImplemented);
        assert!(!classify(status(501), b"").is_retryable());
    }

    #[test]
    fn test_success() {
        assert_eq!(classify(status(200), b"{}"), ResponseClass::Success);
        assert_eq!(classify(status(204), b""), ResponseClass::Success);
        assert_eq!(classify(status(200), b"").error_kind(), None);
    }
}
