//! Credential loading.
//!
//! The on-disk credential file format belongs to the embedding application;
//! it plugs in through [`CredentialsLoader`].

use zsdk_domain::{Cloud, Credentials, SdkError};

/// Source of the credentials bundle for one tenant.
pub trait CredentialsLoader: Send + Sync {
    /// # Errors
    /// Returns `SdkError::Credentials` if the source is absent or malformed.
    fn load(&self) -> Result<Credentials, SdkError>;
}

/// Reads `<PREFIX>_CLIENT_ID`, `<PREFIX>_CLIENT_SECRET`, `<PREFIX>_TENANT_ID`
/// and the optional `<PREFIX>_CLOUD`.
#[derive(Debug, Clone)]
pub struct EnvCredentialsLoader {
    prefix: String,
}

impl Default for EnvCredentialsLoader {
    fn default() -> Self {
        Self::with_prefix("ZSDK")
    }
}

impl EnvCredentialsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn key(&self, name: &str) -> String {
        format!("{}_{name}", self.prefix)
    }

    fn required(&self, name: &str) -> Result<String, SdkError> {
        let key = self.key(name);
        std::env::var(&key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SdkError::Credentials(format!("Missing environment variable: {key}")))
    }
}

impl CredentialsLoader for EnvCredentialsLoader {
    fn load(&self) -> Result<Credentials, SdkError> {
        let client_id = self.required("CLIENT_ID")?;
        let client_secret = self.required("CLIENT_SECRET")?;
        let tenant_id = self.required("TENANT_ID")?;

        let cloud = match std::env::var(self.key("CLOUD")) {
            Ok(raw) if !raw.trim().is_empty() => {
                raw.parse::<Cloud>().map_err(SdkError::Credentials)?
            }
            _ => Cloud::default(),
        };

        tracing::debug!(%client_id, %tenant_id, %cloud, "credentials loaded from environment");
        Ok(Credentials { client_id, client_secret, tenant_id, cloud })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_LOCK;

    fn set(prefix: &str, values: &[(&str, &str)]) {
        for (name, value) in values {
            std::env::set_var(format!("{prefix}_{name}"), value);
        }
    }

    fn clear(prefix: &str) {
        for name in ["CLIENT_ID", "CLIENT_SECRET", "TENANT_ID", "CLOUD"] {
            std::env::remove_var(format!("{prefix}_{name}"));
        }
    }

    #[test]
    fn test_loads_all_fields() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set(
            "ZSDK_TEST_A",
            &[
                ("CLIENT_ID", "id"),
                ("CLIENT_SECRET", "secret"),
                ("TENANT_ID", "acme"),
                ("CLOUD", "Beta"),
            ],
        );

        let creds = EnvCredentialsLoader::with_prefix("ZSDK_TEST_A").load().unwrap();
        assert_eq!(creds, Credentials::new("id", "secret", "acme", Cloud::Beta));

        clear("ZSDK_TEST_A");
    }

    #[test]
    fn test_missing_variable_is_named() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear("ZSDK_TEST_B");
        set("ZSDK_TEST_B", &[("CLIENT_ID", "id")]);

        let err = EnvCredentialsLoader::with_prefix("ZSDK_TEST_B").load().unwrap_err();
        assert!(matches!(
            err,
            SdkError::Credentials(ref msg) if msg.contains("ZSDK_TEST_B_CLIENT_SECRET")
        ));

        clear("ZSDK_TEST_B");
    }

    #[test]
    fn test_invalid_cloud() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set(
            "ZSDK_TEST_C",
            &[("CLIENT_ID", "id"), ("CLIENT_SECRET", "s"), ("TENANT_ID", "t"), ("CLOUD", "mars")],
        );

        let err = EnvCredentialsLoader::with_prefix("ZSDK_TEST_C").load().unwrap_err();
        assert!(matches!(err, SdkError::Credentials(ref msg) if msg.contains("Invalid Cloud")));

        clear("ZSDK_TEST_C");
    }
}
