use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use zsdk_common::{
    Admission, Clock, Logger, OperationClass, RequestLimiter, TracingLogger, Unlimited,
};
use zsdk_domain::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_USER_AGENT};
use zsdk_domain::{ClientConfig, RetryConfig, SdkError};

use super::backoff::BackoffPolicy;
use super::classify::{classify, ResponseClass};
use crate::errors::{is_transient, InfraError};

/// A fully read response together with its classification.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub method: Method,
    pub url: Url,
    /// Attempts spent on the logical request, including this one.
    pub attempts: u32,
    pub class: ResponseClass,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        self.class == ResponseClass::Success
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Body as text, for error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the JSON body.
    ///
    /// # Errors
    /// Returns `SdkError::Serialization` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SdkError> {
        serde_json::from_slice(&self.body).map_err(SdkError::from)
    }
}

/// HTTP transport that gates every attempt on the limiter and re-issues
/// throttled, conflicting and failed requests.
#[derive(Clone)]
pub struct RetryingTransport {
    client: ReqwestClient,
    policy: BackoffPolicy,
    max_attempts: u32,
    logger: Arc<dyn Logger>,
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("policy", &self.policy)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryingTransport {
    /// Start building a new transport.
    pub fn builder() -> RetryingTransportBuilder {
        RetryingTransportBuilder::default()
    }

    /// Same transport, limiter and logger with a different attempt ceiling.
    #[must_use]
    pub fn with_max_attempts(&self, attempts: u32) -> Self {
        Self { max_attempts: attempts.max(1), ..self.clone() }
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute the request with admission control and retries.
    ///
    /// Returns the first non-retryable response, or the last response once
    /// the attempt ceiling is reached. Error statuses are not converted into
    /// errors here; callers inspect [`TransportResponse::class`].
    ///
    /// # Errors
    /// - `SdkError::Cancelled` as soon as `cancel` fires
    /// - `SdkError::ExhaustedRetries` if every attempt failed at the network
    ///   level
    /// - `SdkError::Network`/`SdkError::Config` for non-transient failures
    /// - `SdkError::Internal` if the body is a stream and cannot be replayed
    pub async fn execute(
        &self,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, SdkError> {
        let template = builder.build().map_err(|err| SdkError::from(InfraError::from(err)))?;
        let method = template.method().clone();
        let url = template.url().clone();
        let class = OperationClass::from_method(method.as_str());

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.admit(class, cancel).await?;

            let request = template.try_clone().ok_or_else(|| {
                SdkError::Internal(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            })?;

            debug!(attempt, %method, %url, "sending HTTP request");
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SdkError::Cancelled),
                outcome = self.send_once(request) => outcome,
            };

            let delay = match outcome {
                Ok(mut response) => {
                    response.attempts = attempt;
                    debug!(
                        attempt,
                        %method,
                        %url,
                        status = %response.status,
                        "received HTTP response"
                    );

                    if !response.class.is_retryable() {
                        return Ok(response);
                    }
                    if attempt >= self.max_attempts {
                        warn!(
                            attempts = attempt,
                            %method,
                            %url,
                            status = %response.status,
                            kind = ?response.class.error_kind(),
                            "retries exhausted"
                        );
                        self.logger.printf(format_args!(
                            "[ERR] {method} {url} giving up after {attempt} attempts: status {}",
                            response.status.as_u16()
                        ));
                        return Ok(response);
                    }

                    let delay = self.policy.next_delay(Some(&response), class, attempt - 1);
                    self.logger.printf(format_args!(
                        "[DEBUG] {method} {url} ({}) retrying in {}ms (attempt {attempt}/{})",
                        response.status.as_u16(),
                        millis(delay),
                        self.max_attempts
                    ));
                    delay
                }
                Err(err) => {
                    debug!(attempt, %method, %url, error = %err, "HTTP request failed");

                    if !is_transient(&err) {
                        return Err(InfraError::from(err).into());
                    }
                    if attempt >= self.max_attempts {
                        warn!(attempts = attempt, %method, %url, error = %err, "retries exhausted");
                        self.logger.printf(format_args!(
                            "[ERR] {method} {url} giving up after {attempt} attempts: {err}"
                        ));
                        return Err(SdkError::ExhaustedRetries {
                            attempts: attempt,
                            status_code: None,
                            last: err.to_string(),
                        });
                    }

                    let delay = self.policy.next_delay(None, class, attempt - 1);
                    self.logger.printf(format_args!(
                        "[DEBUG] {method} {url} request failed: {err}; \
                         retrying in {}ms (attempt {attempt}/{})",
                        millis(delay),
                        self.max_attempts
                    ));
                    delay
                }
            };

            sleep_or_cancel(delay, cancel).await?;
        }
    }

    /// Block until the limiter admits a request of `class`.
    ///
    /// A cancelled token is checked before every `wait` so that a request
    /// which will never be sent does not take a slot in the window.
    async fn admit(
        &self,
        class: OperationClass,
        cancel: &CancellationToken,
    ) -> Result<(), SdkError> {
        loop {
            if cancel.is_cancelled() {
                return Err(SdkError::Cancelled);
            }
            match self.policy.limiter().wait(class) {
                Admission::Admitted => return Ok(()),
                Admission::Wait(delay) => {
                    debug!(?class, delay_ms = millis(delay), "request held by rate limiter");
                    sleep_or_cancel(delay, cancel).await?;
                }
            }
        }
    }

    async fn send_once(&self, request: Request) -> Result<TransportResponse, reqwest::Error> {
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        let class = classify(status, &body);

        Ok(TransportResponse { status, headers, body, method, url, attempts: 0, class })
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// # Errors
/// Returns `SdkError::Cancelled` if the token is or becomes cancelled.
pub(crate) async fn sleep_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), SdkError> {
    if cancel.is_cancelled() {
        return Err(SdkError::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SdkError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Builder for [`RetryingTransport`].
pub struct RetryingTransportBuilder {
    timeout: Duration,
    max_attempts: u32,
    wait_min: Duration,
    wait_max: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    limiter: Arc<dyn RequestLimiter>,
    logger: Arc<dyn Logger>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for RetryingTransportBuilder {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_min: retry.wait_min,
            wait_max: retry.wait_max,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            default_headers: None,
            limiter: Arc::new(Unlimited),
            logger: Arc::new(TracingLogger),
            clock: None,
        }
    }
}

impl RetryingTransportBuilder {
    /// Builder seeded with the timeout, user agent and retry bounds of
    /// `config`. Limiter, logger and clock keep their defaults.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::default()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .retry(&config.retry)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Bounds of the exponential fallback delay.
    pub fn backoff(mut self, wait_min: Duration, wait_max: Duration) -> Self {
        self.wait_min = wait_min;
        self.wait_max = wait_max;
        self
    }

    pub fn retry(self, config: &RetryConfig) -> Self {
        self.max_attempts(config.max_attempts).backoff(config.wait_min, config.wait_max)
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn limiter(mut self, limiter: Arc<dyn RequestLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Clock used to evaluate HTTP-date retry hints.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    /// Returns `SdkError::Config` if the reqwest client cannot be built.
    pub fn build(self) -> Result<RetryingTransport, SdkError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            SdkError::from(infra)
        })?;

        let mut policy = BackoffPolicy::new(self.limiter, self.wait_min, self.wait_max);
        if let Some(clock) = self.clock {
            policy = policy.with_clock(clock);
        }

        Ok(RetryingTransport {
            client,
            policy,
            max_attempts: self.max_attempts.max(1),
            logger: self.logger,
        })
    }
}
