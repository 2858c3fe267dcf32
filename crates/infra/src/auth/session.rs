//! Session artifacts produced by credential exchanges.

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::RequestBuilder;
use serde_json::Value;
use zsdk_domain::ExpiryPolicy;

/// What gets attached to every authenticated request.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionCredential {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Cookie: <name>=<value>`
    Cookie { name: String, value: String },
}

impl SessionCredential {
    /// Attach the credential to an outgoing request.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            Self::Cookie { name, value } => builder.header(COOKIE, format!("{name}={value}")),
        }
    }

    /// The token or cookie value.
    pub fn secret(&self) -> &str {
        match self {
            Self::Bearer(token) => token,
            Self::Cookie { value, .. } => value,
        }
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::Cookie { name, .. } => write!(f, "Cookie({name}=[REDACTED])"),
        }
    }
}

/// Raw result of one credential exchange.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub credential: SessionCredential,
    /// Lifetime stated by the provider, if any.
    pub expires_in: Option<Duration>,
    /// Provider response fields, kept for callers that need them.
    pub raw: Value,
}

impl IssuedSession {
    pub fn new(credential: SessionCredential) -> Self {
        Self { credential, expires_in: None, raw: Value::Null }
    }

    #[must_use]
    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    #[must_use]
    pub fn raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

/// An authenticated session shared by every request of one client.
///
/// Sessions are immutable; a refresh replaces the whole value. The
/// generation increases with every successful exchange so a caller can tell
/// whether the session it was rejected with is still current.
#[derive(Debug, Clone)]
pub struct Session {
    credential: SessionCredential,
    obtained_at: Instant,
    expires_at: Option<Instant>,
    raw: Value,
    generation: u64,
}

impl Session {
    pub(crate) fn from_issued(
        issued: IssuedSession,
        obtained_at: Instant,
        policy: &ExpiryPolicy,
        generation: u64,
    ) -> Self {
        let expires_at = match policy {
            ExpiryPolicy::FixedTimeout { timeout } => Some(obtained_at + *timeout),
            ExpiryPolicy::ProviderExpiry { margin } => {
                issued.expires_in.map(|lifetime| obtained_at + lifetime.saturating_sub(*margin))
            }
        };

        Self {
            credential: issued.credential,
            obtained_at,
            expires_at,
            raw: issued.raw,
            generation,
        }
    }

    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    pub fn access_token(&self) -> &str {
        self.credential.secret()
    }

    pub fn obtained_at(&self) -> Instant {
        self.obtained_at
    }

    /// `None` when neither the policy nor the provider bounds the lifetime;
    /// such sessions are only replaced after a rejection.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}
