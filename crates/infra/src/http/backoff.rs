//! Delay selection between retry attempts.
//!
//! [`BackoffPolicy::next_delay`] picks the first source that has an opinion:
//! 1. a wait hint sent by the server on a throttled response
//! 2. the local limiter, if it would currently block the request's class
//! 3. capped exponential backoff on the attempt number

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde_json::Value;
use zsdk_common::{Clock, OperationClass, RequestLimiter, SystemClock};
use zsdk_domain::constants::{
    RATE_LIMIT_RESET_HEADER, RETRY_AFTER_BODY_FIELD, RETRY_AFTER_HEADER,
};

use super::client::TransportResponse;

/// Decides how long to sleep before the next attempt.
#[derive(Clone)]
pub struct BackoffPolicy {
    limiter: Arc<dyn RequestLimiter>,
    clock: Arc<dyn Clock>,
    wait_min: Duration,
    wait_max: Duration,
}

impl std::fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("wait_min", &self.wait_min)
            .field("wait_max", &self.wait_max)
            .finish_non_exhaustive()
    }
}

impl BackoffPolicy {
    pub fn new(limiter: Arc<dyn RequestLimiter>, wait_min: Duration, wait_max: Duration) -> Self {
        Self { limiter, clock: Arc::new(SystemClock), wait_min, wait_max: wait_max.max(wait_min) }
    }

    /// Use `clock` to evaluate HTTP-date hints.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The limiter this policy consults; the transport gates admissions on it
    /// too.
    pub fn limiter(&self) -> &Arc<dyn RequestLimiter> {
        &self.limiter
    }

    /// Delay before retry number `attempt` (zero-based) of a request of
    /// class `class`.
    ///
    /// `previous` is the last response, or `None` after a network failure.
    /// A server hint is returned verbatim, even when it exceeds `wait_max`.
    pub fn next_delay(
        &self,
        previous: Option<&TransportResponse>,
        class: OperationClass,
        attempt: u32,
    ) -> Duration {
        if let Some(response) = previous.filter(|r| r.class.is_throttled()) {
            if let Some(hint) = self.server_hint(&response.headers, &response.body) {
                return hint;
            }
        }

        let admission = self.limiter.peek(class);
        if admission.must_wait() {
            return admission.delay();
        }

        self.exponential(attempt)
    }

    /// `min(wait_max, wait_min * 2^attempt)`, saturating at `wait_max`.
    pub fn exponential(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.wait_min.as_nanos() as f64 * 2f64.powi(exponent);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let truncated = scaled as u64;

        // `as` saturates; a mismatch means the product left the u64 range
        #[allow(clippy::cast_precision_loss)]
        if !scaled.is_finite() || truncated as f64 != scaled.trunc() || truncated == u64::MAX {
            return self.wait_max;
        }

        Duration::from_nanos(truncated).min(self.wait_max)
    }

    /// Wait hint from the headers, falling back to the JSON body.
    pub fn server_hint(&self, headers: &HeaderMap, body: &[u8]) -> Option<Duration> {
        self.header_hint(headers).or_else(|| self.body_hint(body)).filter(|d| !d.is_zero())
    }

    fn header_hint(&self, headers: &HeaderMap) -> Option<Duration> {
        [RETRY_AFTER_HEADER, RATE_LIMIT_RESET_HEADER]
            .iter()
            .filter_map(|name| headers.get(*name).and_then(|value| value.to_str().ok()))
            .find_map(|raw| self.parse_hint(raw))
    }

    fn body_hint(&self, body: &[u8]) -> Option<Duration> {
        let value: Value = serde_json::from_slice(body).ok()?;
        match value.get(RETRY_AFTER_BODY_FIELD)? {
            Value::String(raw) => self.parse_hint(raw),
            Value::Number(n) => n.as_f64().and_then(seconds_to_duration),
            _ => None,
        }
    }

    /// Accepts `"5"`, `"5s"`, `"5 seconds"`, `"2.5"` and HTTP-dates.
    fn parse_hint(&self, raw: &str) -> Option<Duration> {
        let trimmed = raw.trim();
        let numeric = trimmed
            .strip_suffix("seconds")
            .or_else(|| trimmed.strip_suffix("second"))
            .or_else(|| trimmed.strip_suffix('s'))
            .unwrap_or(trimmed)
            .trim();

        if let Ok(secs) = numeric.parse::<f64>() {
            return seconds_to_duration(secs);
        }

        let at = DateTime::parse_from_rfc2822(trimmed).ok()?.with_timezone(&Utc);
        let now: DateTime<Utc> = DateTime::<Utc>::from(self.clock.system_time());
        (at - now).to_std().ok()
    }
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs > 0.0).then(|| Duration::try_from_secs_f64(secs).ok()).flatten()
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use reqwest::{Method, StatusCode};
    use url::Url;
    use zsdk_common::{MockClock, SlidingWindowLimiter, Unlimited};

    use super::*;
    use crate::http::classify::classify;

    fn http_date(at: std::time::SystemTime) -> String {
        DateTime::<Utc>::from(at).format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    fn policy_with(limiter: Arc<dyn RequestLimiter>) -> BackoffPolicy {
        BackoffPolicy::new(limiter, Duration::from_secs(2), Duration::from_secs(10))
    }

    fn response(status: u16, headers: &[(&'static str, &str)], body: &str) -> TransportResponse {
        let status = StatusCode::from_u16(status).unwrap();
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        TransportResponse {
            status,
            headers: map,
            body: body.as_bytes().to_vec(),
            method: Method::GET,
            url: Url::parse("https://api.example.com/users").unwrap(),
            attempts: 1,
            class: classify(status, body.as_bytes()),
        }
    }

    #[test]
    fn test_retry_after_header_is_returned_verbatim() {
        let policy = policy_with(Arc::new(Unlimited));
        let throttled = response(429, &[("Retry-After", "5")], "");
        for attempt in [0, 3, 50] {
            assert_eq!(
                policy.next_delay(Some(&throttled), OperationClass::Read, attempt),
                Duration::from_secs(5)
            );
        }
    }

    #[test]
    fn test_hint_wins_over_blocking_limiter() {
        let clock = MockClock::new();
        let limiter = Arc::new(SlidingWindowLimiter::with_clock(
            zsdk_common::WindowLimits::new(1, 1, 10, 10),
            clock,
        ));
        limiter.wait(OperationClass::Read);
        let policy = policy_with(limiter.clone());

        let throttled = response(429, &[("Retry-After", "5")], "");
        assert_eq!(
            policy.next_delay(Some(&throttled), OperationClass::Read, 0),
            Duration::from_secs(5)
        );

        // Without a hint the limiter's remaining window is used
        let bare = response(429, &[], "");
        assert_eq!(
            policy.next_delay(Some(&bare), OperationClass::Read, 0),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_body_hint_when_header_absent() {
        let policy = policy_with(Arc::new(Unlimited));
        let throttled = response(429, &[], r#"{"message":"Rate Limit","Retry-After":"7 seconds"}"#);
        assert_eq!(
            policy.next_delay(Some(&throttled), OperationClass::Write, 0),
            Duration::from_secs(7)
        );

        let numeric = response(503, &[], r#"{"Retry-After": 3}"#);
        assert_eq!(
            policy.next_delay(Some(&numeric), OperationClass::Write, 0),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_hint_formats() {
        let policy = policy_with(Arc::new(Unlimited));
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("12s"));
        assert_eq!(policy.server_hint(&headers, b""), Some(Duration::from_secs(12)));

        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Reset", HeaderValue::from_static("4"));
        assert_eq!(policy.server_hint(&headers, b""), Some(Duration::from_secs(4)));

        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("0"));
        assert_eq!(policy.server_hint(&headers, b""), None);

        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("soon"));
        assert_eq!(policy.server_hint(&headers, b""), None);
    }

    #[test]
    fn test_http_date_hint_uses_clock() {
        let clock = MockClock::at_epoch_offset(Duration::from_secs(1_700_000_000));
        let policy = policy_with(Arc::new(Unlimited)).with_clock(Arc::new(clock.clone()));
        let at = clock.system_time() + Duration::from_secs(30);

        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_str(&http_date(at)).unwrap());
        assert_eq!(policy.server_hint(&headers, b""), Some(Duration::from_secs(30)));

        // A date in the past carries no delay
        clock.advance_secs(60);
        assert_eq!(policy.server_hint(&headers, b""), None);
    }

    #[test]
    fn test_hint_ignored_on_non_throttled_response() {
        let policy = policy_with(Arc::new(Unlimited));
        let conflict = response(
            409,
            &[("Retry-After", "30")],
            r#"{"code":"EDIT_LOCK_NOT_AVAILABLE"}"#,
        );
        assert_eq!(
            policy.next_delay(Some(&conflict), OperationClass::Write, 0),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_exponential_is_monotonic_and_saturates() {
        let policy = policy_with(Arc::new(Unlimited));
        assert_eq!(policy.exponential(0), Duration::from_secs(2));
        assert_eq!(policy.exponential(1), Duration::from_secs(4));
        assert_eq!(policy.exponential(2), Duration::from_secs(8));
        assert_eq!(policy.exponential(3), Duration::from_secs(10));

        let mut previous = Duration::ZERO;
        for attempt in 0..200 {
            let delay = policy.exponential(attempt);
            assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
            assert!(delay <= Duration::from_secs(10));
            previous = delay;
        }
        assert_eq!(policy.exponential(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_network_failure_uses_limiter_then_exponential() {
        let clock = MockClock::new();
        let limiter = Arc::new(SlidingWindowLimiter::with_clock(
            zsdk_common::WindowLimits::new(5, 1, 10, 10),
            clock.clone(),
        ));
        limiter.wait(OperationClass::Write);
        clock.advance_secs(4);
        let policy = policy_with(limiter);

        assert_eq!(policy.next_delay(None, OperationClass::Write, 0), Duration::from_secs(6));
        // Reads are unaffected by the write bucket
        assert_eq!(policy.next_delay(None, OperationClass::Read, 1), Duration::from_secs(4));
    }
}
