//! Credential exchanges that turn long-lived credentials into sessions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::Method;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use zsdk_common::{Clock, SystemClock};
use zsdk_domain::{Credentials, SdkError};

use super::session::{IssuedSession, Session, SessionCredential};
use crate::errors::InfraError;
use crate::http::{ResponseClass, RetryingTransport, TransportResponse};

const TOKEN_PATH: &str = "/oauth2/v1/token";
const DEFAULT_AUDIENCE: &str = "https://api.zscaler.com";
const SESSION_PATH: &str = "authenticatedSession";
const SESSION_COOKIE: &str = "JSESSIONID";

/// Obtains a fresh session from the provider.
///
/// Implementations perform their network calls through the supplied
/// transport so exchanges are rate limited and retried like any other
/// request.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(
        &self,
        transport: &RetryingTransport,
        cancel: &CancellationToken,
    ) -> Result<IssuedSession, SdkError>;

    /// End a session server-side once it is no longer used, on shutdown or
    /// after a refresh replaced it. Token-based providers have nothing to do.
    ///
    /// Callers bound the call with `cancel`; implementations should not
    /// retry beyond what a best-effort logout warrants.
    async fn release(
        &self,
        _session: &Session,
        _transport: &RetryingTransport,
        _cancel: &CancellationToken,
    ) -> Result<(), SdkError> {
        Ok(())
    }
}

/// Map a non-successful exchange response onto an error.
fn rejection(what: &str, response: &TransportResponse) -> SdkError {
    let status = response.status.as_u16();
    match response.class {
        ResponseClass::AuthRejected | ResponseClass::ClientError => {
            SdkError::NotAuthenticated(format!("{what} rejected ({status}): {}", response.text()))
        }
        _ => SdkError::Api { status_code: status, body: response.text() },
    }
}

/// OAuth2 `client_credentials` grant against the tenant's identity provider.
#[derive(Debug, Clone)]
pub struct ClientCredentialsExchange {
    token_url: Url,
    credentials: Credentials,
    audience: Option<String>,
}

impl ClientCredentialsExchange {
    pub fn new(token_url: Url, credentials: Credentials) -> Self {
        Self { token_url, credentials, audience: Some(DEFAULT_AUDIENCE.to_string()) }
    }

    /// Exchange against `https://<tenant>.<identity suffix>/oauth2/v1/token`.
    ///
    /// # Errors
    /// Returns `SdkError::Config` if the tenant id does not form a valid host.
    pub fn for_tenant(credentials: Credentials) -> Result<Self, SdkError> {
        let raw = format!(
            "https://{}.{}{TOKEN_PATH}",
            credentials.tenant_id,
            credentials.cloud.identity_suffix()
        );
        let token_url = Url::parse(&raw).map_err(|err| SdkError::from(InfraError::from(err)))?;
        Ok(Self::new(token_url, credentials))
    }

    /// Override or clear the `audience` form parameter.
    #[must_use]
    pub fn audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl CredentialExchange for ClientCredentialsExchange {
    async fn exchange(
        &self,
        transport: &RetryingTransport,
        cancel: &CancellationToken,
    ) -> Result<IssuedSession, SdkError> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        if let Some(audience) = &self.audience {
            form.push(("audience", audience.as_str()));
        }

        debug!(
            url = %self.token_url,
            client_id = %self.credentials.client_id,
            "requesting access token"
        );
        let builder = transport.request(Method::POST, self.token_url.clone()).form(&form);
        let response = transport.execute(builder, cancel).await?;
        if !response.is_success() {
            return Err(rejection("token exchange", &response));
        }

        let raw: Value = response.json()?;
        let token = raw
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                SdkError::NotAuthenticated("token response carried no access_token".into())
            })?
            .to_string();

        let mut issued = IssuedSession::new(SessionCredential::Bearer(token));
        if let Some(secs) = raw.get("expires_in").and_then(seconds_field) {
            issued = issued.expires_in(Duration::from_secs(secs));
        }
        info!(expires_in = ?issued.expires_in, "access token issued");
        Ok(issued.raw(raw))
    }
}

/// `expires_in` arrives as a number or as a numeric string depending on the
/// identity provider.
fn seconds_field(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Legacy username/password/API-key login that yields a `JSESSIONID` cookie.
pub struct ApiKeyExchange {
    base_url: Url,
    username: String,
    password: String,
    api_key: String,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ApiKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyExchange")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl ApiKeyExchange {
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            api_key: api_key.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock whose wall time seeds the key obfuscation.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn session_url(&self) -> Result<Url, SdkError> {
        let raw = format!("{}/{SESSION_PATH}", self.base_url.as_str().trim_end_matches('/'));
        Url::parse(&raw).map_err(|err| SdkError::from(InfraError::from(err)))
    }
}

#[async_trait]
impl CredentialExchange for ApiKeyExchange {
    async fn exchange(
        &self,
        transport: &RetryingTransport,
        cancel: &CancellationToken,
    ) -> Result<IssuedSession, SdkError> {
        let timestamp = self.clock.millis_since_epoch();
        let payload = json!({
            "apiKey": obfuscate_api_key(&self.api_key, timestamp)?,
            "username": self.username,
            "password": self.password,
            "timestamp": timestamp.to_string(),
        });

        let url = self.session_url()?;
        debug!(%url, username = %self.username, "opening authenticated session");
        let builder = transport.request(Method::POST, url).json(&payload);
        let response = transport.execute(builder, cancel).await?;
        if !response.is_success() {
            return Err(rejection("session login", &response));
        }

        let value = session_cookie(&response).ok_or_else(|| {
            SdkError::NotAuthenticated(format!("login response carried no {SESSION_COOKIE} cookie"))
        })?;
        let raw = response.json::<Value>().unwrap_or(Value::Null);

        info!(username = %self.username, "authenticated session opened");
        Ok(IssuedSession::new(SessionCredential::Cookie { name: SESSION_COOKIE.into(), value })
            .raw(raw))
    }

    async fn release(
        &self,
        session: &Session,
        transport: &RetryingTransport,
        cancel: &CancellationToken,
    ) -> Result<(), SdkError> {
        // One shot: a throttled logout is not worth the full retry budget
        let transport = transport.with_max_attempts(1);
        let builder =
            session.credential().apply(transport.request(Method::DELETE, self.session_url()?));
        let response = transport.execute(builder, cancel).await?;
        if response.is_success() {
            info!(username = %self.username, "authenticated session closed");
            Ok(())
        } else {
            Err(SdkError::Api { status_code: response.status.as_u16(), body: response.text() })
        }
    }
}

fn session_cookie(response: &TransportResponse) -> Option<String> {
    response
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

/// Obfuscate an API key with the last six digits of a millisecond timestamp.
///
/// The first six characters are picked by the timestamp digits, the last six
/// by the digits of half that number, offset by two.
///
/// # Errors
/// Returns `SdkError::Credentials` if the key is shorter than 12 characters.
pub fn obfuscate_api_key(api_key: &str, timestamp_millis: u64) -> Result<String, SdkError> {
    let key: Vec<char> = api_key.chars().collect();
    if key.len() < 12 {
        return Err(SdkError::Credentials("API key must be at least 12 characters".into()));
    }

    let high = timestamp_millis % 1_000_000;
    let high_digits = format!("{high:06}");
    let low_digits = format!("{:06}", high >> 1);

    let pick = |digit: char, offset: usize| -> Option<char> {
        let index = usize::try_from(digit.to_digit(10)?).ok()? + offset;
        key.get(index).copied()
    };

    high_digits
        .chars()
        .map(|d| pick(d, 0))
        .chain(low_digits.chars().map(|d| pick(d, 2)))
        .collect::<Option<String>>()
        .ok_or_else(|| SdkError::Internal("API key obfuscation index out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obfuscation_picks_characters_by_timestamp_digits() {
        let obfuscated = obfuscate_api_key("abcdefghijkl", 1_700_000_123_456).unwrap();
        assert_eq!(obfuscated, "bcdefgcidjek");
    }

    #[test]
    fn test_obfuscation_pads_short_halves() {
        // 000010 >> 1 = 5 -> "000005"
        let obfuscated = obfuscate_api_key("abcdefghijkl", 1_700_000_000_010).unwrap();
        assert_eq!(obfuscated, "aaaabaccccch");
    }

    #[test]
    fn test_obfuscation_rejects_short_key() {
        assert!(matches!(obfuscate_api_key("short", 1), Err(SdkError::Credentials(_))));
    }

    #[test]
    fn test_for_tenant_builds_identity_url() {
        let creds = Credentials::new("id", "secret", "acme", zsdk_domain::Cloud::Beta);
        let exchange = ClientCredentialsExchange::for_tenant(creds).unwrap();
        assert_eq!(exchange.token_url().as_str(), "https://acme.zsloginbeta.net/oauth2/v1/token");
    }

    #[test]
    fn test_seconds_field_accepts_strings() {
        assert_eq!(seconds_field(&json!(3600)), Some(3600));
        assert_eq!(seconds_field(&json!("3600")), Some(3600));
        assert_eq!(seconds_field(&json!(null)), None);
    }
}
