//! Credentials bundle produced by a credentials loader.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::impl_label_conversions;

/// Cloud the tenant lives in; selects the default API host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    #[default]
    Production,
    Beta,
    Preview,
}

impl_label_conversions!(Cloud {
    Production => "production",
    Beta => "beta",
    Preview => "preview",
});

impl Cloud {
    /// Host suffix used when composing default service URLs.
    pub fn host_suffix(self) -> &'static str {
        match self {
            Self::Production => "zsapi.net",
            Self::Beta => "beta.zsapi.net",
            Self::Preview => "preview.zsapi.net",
        }
    }

    /// Host suffix of the identity provider issuing OAuth tokens.
    pub fn identity_suffix(self) -> &'static str {
        match self {
            Self::Production => "zslogin.net",
            Self::Beta => "zsloginbeta.net",
            Self::Preview => "zsloginpreview.net",
        }
    }
}

/// Client credentials for a single tenant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    #[serde(default)]
    pub cloud: Cloud,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
        cloud: Cloud,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant_id: tenant_id.into(),
            cloud,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("cloud", &self.cloud)
            .finish()
    }
}
