//! Service client composing sessions, the retrying transport and the cache.
//!
//! Resource packages call [`ServiceClient::do_request`] or the typed CRUD
//! helpers and receive either the response body or exactly one [`SdkError`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;
use zsdk_common::{
    request_fingerprint, CachedResponse, Clock, Logger, MokaResponseCache, OperationClass,
    RequestLimiter, ResponseCache, TracingLogger,
};
use zsdk_domain::{ClientConfig, Cloud, SdkError, ServicePreset};

use crate::auth::{CredentialExchange, Session, SessionManager};
use crate::config::limiter_from_config;
use crate::errors::InfraError;
use crate::http::{ResponseClass, RetryingTransport, RetryingTransportBuilder, TransportResponse};

/// One client per product line and tenant.
pub struct ServiceClient {
    preset: ServicePreset,
    base_url: Url,
    transport: RetryingTransport,
    sessions: Arc<SessionManager>,
    cache: Option<Arc<dyn ResponseCache>>,
    cache_ttl: Duration,
    root: CancellationToken,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("preset", &self.preset)
            .field("base_url", &self.base_url.as_str())
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl ServiceClient {
    /// Create a builder seeded with the preset's defaults.
    pub fn builder(preset: ServicePreset) -> ServiceClientBuilder {
        ServiceClientBuilder::new(preset)
    }

    pub fn preset(&self) -> ServicePreset {
        self.preset
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn transport(&self) -> &RetryingTransport {
        &self.transport
    }

    /// Send one logical request and return the response body.
    ///
    /// `path` is either relative to the base URL or an absolute URL. A 401 or
    /// 403 refreshes the session once and repeats the request once; a second
    /// rejection is final.
    ///
    /// # Errors
    /// - `SdkError::NotAuthenticated` if the request is rejected after a
    ///   fresh session, or the credential exchange fails
    /// - `SdkError::ObjectNotFound` on 404
    /// - `SdkError::RateLimited` if throttling outlasted every attempt
    /// - `SdkError::ExhaustedRetries` if conflicts, server errors or network
    ///   failures outlasted every attempt
    /// - `SdkError::Api` for any other error status
    /// - `SdkError::Cancelled` if `cancel` fires
    #[instrument(skip_all, fields(%method, path = %path))]
    pub async fn do_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SdkError> {
        let url = self.resolve(path)?;
        let cache_key = request_fingerprint(method.as_str(), url.as_str());

        if method == Method::GET {
            if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&cache_key)) {
                debug!(url = %url, "served from response cache");
                return Ok(hit.body.to_vec());
            }
        }

        let session = self.sessions.session(cancel).await?;
        let mut response = self.send(&method, &url, body.as_deref(), &session, cancel).await?;

        if response.class == ResponseClass::AuthRejected {
            let fresh = self.sessions.refresh_after_rejection(&session, cancel).await?;
            response = self.send(&method, &url, body.as_deref(), &fresh, cancel).await?;
            if response.class == ResponseClass::AuthRejected {
                return Err(SdkError::NotAuthenticated(format!(
                    "{method} {url} rejected with {} after session refresh",
                    response.status.as_u16()
                )));
            }
        }

        let status = response.status.as_u16();
        let body = into_result(response)?;

        if let Some(cache) = &self.cache {
            if method == Method::GET {
                cache.set(&cache_key, CachedResponse::new(status, body.clone()), self.cache_ttl);
            } else if OperationClass::from_method(method.as_str()).is_write() {
                cache.invalidate_all();
            }
        }

        Ok(body)
    }

    /// [`ServiceClient::do_request`] with a JSON body, cancelled by
    /// [`ServiceClient::shutdown`].
    ///
    /// # Errors
    /// See [`ServiceClient::do_request`]; also `SdkError::Serialization` if the
    /// body cannot be encoded.
    pub async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<Vec<u8>, SdkError> {
        let encoded = body.map(serde_json::to_vec).transpose()?;
        let cancel = self.root.child_token();
        self.do_request(method, path, encoded, &cancel).await
    }

    /// POST `body` and decode the created resource.
    ///
    /// # Errors
    /// See [`ServiceClient::request`].
    pub async fn create<T, R>(&self, path: &str, body: &T) -> Result<R, SdkError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        decode(&self.request(Method::POST, path, Some(body)).await?)
    }

    /// GET and decode a resource.
    ///
    /// # Errors
    /// See [`ServiceClient::request`].
    pub async fn read<R: DeserializeOwned>(&self, path: &str) -> Result<R, SdkError> {
        decode(&self.request::<Value>(Method::GET, path, None).await?)
    }

    /// PUT `body` and decode the updated resource.
    ///
    /// # Errors
    /// See [`ServiceClient::request`].
    pub async fn update<T, R>(&self, path: &str, body: &T) -> Result<R, SdkError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        decode(&self.request(Method::PUT, path, Some(body)).await?)
    }

    /// DELETE a resource.
    ///
    /// # Errors
    /// See [`ServiceClient::request`].
    pub async fn delete(&self, path: &str) -> Result<(), SdkError> {
        self.request::<Value>(Method::DELETE, path, None).await.map(|_| ())
    }

    /// Cancel in-flight requests, stop the keep-alive ticker, release the
    /// session and close the cache.
    pub async fn shutdown(&self) {
        info!(preset = %self.preset, "shutting down service client");
        self.root.cancel();
        self.sessions.shutdown().await;
        if let Some(cache) = &self.cache {
            cache.close();
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        session: &Session,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, SdkError> {
        let mut builder = self.transport.request(method.clone(), url.clone());
        builder = session.credential().apply(builder);
        if let Some(bytes) = body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(bytes.to_vec());
        }
        self.transport.execute(builder, cancel).await
    }

    fn resolve(&self, path: &str) -> Result<Url, SdkError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|err| SdkError::from(InfraError::from(err)))
    }
}

/// Map a terminal response onto the body or the single error the caller
/// sees.
fn into_result(response: TransportResponse) -> Result<Vec<u8>, SdkError> {
    let status_code = response.status.as_u16();
    match response.class {
        ResponseClass::Success => Ok(response.body),
        ResponseClass::NotFound => Err(SdkError::ObjectNotFound { url: response.url.to_string() }),
        ResponseClass::Throttled => Err(SdkError::RateLimited {
            status_code,
            attempts: response.attempts,
            body: response.text(),
        }),
        ResponseClass::Conflict(_) | ResponseClass::ServerError => Err(SdkError::ExhaustedRetries {
            attempts: response.attempts,
            status_code: Some(status_code),
            last: response.text(),
        }),
        ResponseClass::AuthRejected => Err(SdkError::NotAuthenticated(response.text())),
        ResponseClass::ClientError | ResponseClass::NotImplemented => {
            Err(SdkError::Api { status_code, body: response.text() })
        }
    }
}

/// Decode a JSON body; an empty body (204) decodes as `null`.
fn decode<R: DeserializeOwned>(body: &[u8]) -> Result<R, SdkError> {
    let decoded = if body.is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(body)
    };
    decoded.map_err(SdkError::from)
}

/// Builder for [`ServiceClient`].
pub struct ServiceClientBuilder {
    preset: ServicePreset,
    config: Option<ClientConfig>,
    base_url: Option<String>,
    cloud: Cloud,
    exchange: Option<Arc<dyn CredentialExchange>>,
    limiter: Option<Arc<dyn RequestLimiter>>,
    cache: Option<Arc<dyn ResponseCache>>,
    logger: Arc<dyn Logger>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServiceClientBuilder {
    fn new(preset: ServicePreset) -> Self {
        Self {
            preset,
            config: None,
            base_url: None,
            cloud: Cloud::default(),
            exchange: None,
            limiter: None,
            cache: None,
            logger: Arc::new(TracingLogger),
            clock: None,
        }
    }

    /// Replace the preset's default configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the base URL from the configuration or preset.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Cloud used to derive the preset's default base URL.
    pub fn cloud(mut self, cloud: Cloud) -> Self {
        self.cloud = cloud;
        self
    }

    pub fn exchange(mut self, exchange: Arc<dyn CredentialExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Use `limiter` instead of the one described by the configuration.
    pub fn limiter(mut self, limiter: Arc<dyn RequestLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Use `cache` regardless of `cache.enabled`.
    pub fn cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Clock for session expiry and HTTP-date retry hints.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the client and start the session keep-alive if configured.
    ///
    /// # Errors
    /// - `SdkError::Config` for an invalid configuration or base URL, a
    ///   missing credential exchange, or a keep-alive requested outside a
    ///   tokio runtime
    pub fn build(self) -> Result<ServiceClient, SdkError> {
        let config = self.config.unwrap_or_else(|| self.preset.client_config());
        config.validate()?;

        let raw_url = self
            .base_url
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| self.preset.default_base_url(self.cloud));
        let base_url = Url::parse(&raw_url).map_err(|err| SdkError::from(InfraError::from(err)))?;

        let exchange = self
            .exchange
            .ok_or_else(|| SdkError::Config("credential exchange not set".to_string()))?;
        let limiter = self.limiter.unwrap_or_else(|| limiter_from_config(&config.rate_limit));

        let mut transport =
            RetryingTransportBuilder::from_config(&config).limiter(limiter).logger(self.logger);
        if let Some(clock) = &self.clock {
            transport = transport.clock(Arc::clone(clock));
        }
        let transport = transport.build()?;

        let mut sessions = SessionManager::new(exchange, transport.clone(), config.session.expiry);
        if let Some(clock) = self.clock {
            sessions = sessions.with_clock(clock);
        }
        let sessions = Arc::new(sessions);
        if let Some(interval) = config.session.keep_alive() {
            sessions.start_keep_alive(interval)?;
        }

        let cache = self.cache.or_else(|| {
            config.cache.enabled.then(|| {
                Arc::new(MokaResponseCache::new(config.cache.max_capacity, config.cache.tti))
                    as Arc<dyn ResponseCache>
            })
        });

        info!(
            preset = %self.preset,
            base_url = %base_url,
            cache = cache.is_some(),
            "service client ready"
        );

        Ok(ServiceClient {
            preset: self.preset,
            base_url,
            transport,
            sessions,
            cache,
            cache_ttl: config.cache.ttl,
            root: CancellationToken::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::{IssuedSession, SessionCredential};

    struct StaticExchange;

    #[async_trait]
    impl CredentialExchange for StaticExchange {
        async fn exchange(
            &self,
            _transport: &RetryingTransport,
            _cancel: &CancellationToken,
        ) -> Result<IssuedSession, SdkError> {
            Ok(IssuedSession::new(SessionCredential::Bearer("static".into())))
        }
    }

    fn client(server: &MockServer) -> ServiceClient {
        let mut config = ServicePreset::OneApi.client_config();
        config.retry.wait_min = Duration::from_millis(5);
        config.retry.wait_max = Duration::from_millis(20);
        config.retry.max_attempts = 3;
        ServiceClient::builder(ServicePreset::OneApi)
            .config(config)
            .base_url(format!("{}/api/v1", server.uri()))
            .exchange(Arc::new(StaticExchange))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_read_attaches_bearer_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/7"))
            .and(header("Authorization", "Bearer static"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":7}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let user: Value = client.read("/users/7").await.unwrap();
        assert_eq!(user["id"], 7);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v1/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/api/v1/invalid"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad field"))
            .mount(&server)
            .await;
        Mock::given(path("/api/v1/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client(&server);

        let err = client.read::<Value>("missing").await.unwrap_err();
        assert!(
            matches!(err, SdkError::ObjectNotFound { ref url } if url.ends_with("/api/v1/missing"))
        );

        let err = client.read::<Value>("invalid").await.unwrap_err();
        assert!(matches!(err, SdkError::Api { status_code: 400, ref body } if body == "bad field"));

        let err = client.read::<Value>("busy").await.unwrap_err();
        assert!(matches!(err, SdkError::RateLimited { status_code: 429, attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/rules/1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client.delete("rules/1").await.unwrap();
    }

    #[tokio::test]
    async fn test_absolute_urls_bypass_base() {
        let server = MockServer::start().await;
        Mock::given(path("/other/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("true"))
            .mount(&server)
            .await;

        let client = client(&server);
        let pong: bool = client.read(&format!("{}/other/ping", server.uri())).await.unwrap();
        assert!(pong);
    }

    #[test]
    fn test_build_requires_exchange() {
        let result = ServiceClient::builder(ServicePreset::Zpa).build();
        assert!(matches!(result, Err(SdkError::Config(_))));
    }

    #[test]
    fn test_default_base_url_from_preset() {
        let client = ServiceClient::builder(ServicePreset::Zcc)
            .cloud(Cloud::Beta)
            .exchange(Arc::new(StaticExchange))
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "https://zcc.beta.zsapi.net/");
    }
}
