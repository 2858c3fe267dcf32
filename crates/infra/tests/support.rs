//! Shared helpers for zsdk-infra integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use zsdk_common::{RequestLimiter, Unlimited};
use zsdk_domain::SdkError;
use zsdk_infra::{CredentialExchange, IssuedSession, RetryingTransport, SessionCredential};

/// Exchange that sleeps for `delay`, counts its invocations and issues
/// `token-<n>` bearer tokens.
pub struct CountingExchange {
    calls: AtomicU64,
    delay: Duration,
    expires_in: Option<Duration>,
}

impl CountingExchange {
    pub fn new(delay: Duration) -> Self {
        Self { calls: AtomicU64::new(0), delay, expires_in: None }
    }

    pub fn expiring(delay: Duration, expires_in: Duration) -> Self {
        Self { expires_in: Some(expires_in), ..Self::new(delay) }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialExchange for CountingExchange {
    async fn exchange(
        &self,
        _transport: &RetryingTransport,
        cancel: &CancellationToken,
    ) -> Result<IssuedSession, SdkError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::select! {
            () = cancel.cancelled() => return Err(SdkError::Cancelled),
            () = tokio::time::sleep(self.delay) => {}
        }
        let mut issued = IssuedSession::new(SessionCredential::Bearer(format!("token-{n}")));
        if let Some(expires_in) = self.expires_in {
            issued = issued.expires_in(expires_in);
        }
        Ok(issued)
    }
}

/// Transport with millisecond backoff so retry tests stay fast.
pub fn fast_transport(limiter: Arc<dyn RequestLimiter>, attempts: u32) -> RetryingTransport {
    RetryingTransport::builder()
        .backoff(Duration::from_millis(5), Duration::from_millis(40))
        .max_attempts(attempts)
        .limiter(limiter)
        .timeout(Duration::from_secs(5))
        .build()
        .expect("transport should build")
}

pub fn unlimited_transport() -> RetryingTransport {
    fast_transport(Arc::new(Unlimited), 3)
}

/// Install a test subscriber once; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("zsdk_infra=debug")
        .try_init();
}
