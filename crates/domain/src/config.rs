//! Client configuration structures
//!
//! Every [`ClientConfig`] is owned by exactly one service client; nothing in
//! this module is process-global. Loading from the environment or from disk
//! lives in `zsdk-infra::config`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTI_SECS, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_EXPIRY_MARGIN_SECS, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_WAIT_MAX_MS, DEFAULT_RETRY_WAIT_MIN_MS,
    DEFAULT_SESSION_TIMEOUT_SECS, DEFAULT_USER_AGENT, SECONDS_PER_HOUR,
};
use crate::credentials::Cloud;
use crate::errors::SdkError;
use crate::impl_label_conversions;
use crate::utils::duration_millis;

/// Shape of the client-side quota.
///
/// A limit of `0` disables the corresponding window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateLimitConfig {
    /// Independent read (GET) and write (POST/PUT/DELETE) buckets, each with
    /// an optional hourly window on top of the short one.
    Dual {
        read_limit: u32,
        write_limit: u32,
        read_period_secs: u64,
        write_period_secs: u64,
        #[serde(default)]
        read_hourly_limit: u32,
        #[serde(default)]
        write_hourly_limit: u32,
        /// Extra hourly window applied to DELETE requests only.
        #[serde(default)]
        delete_hourly_limit: u32,
    },
    /// One undifferentiated quota for every method.
    Global { limit: u32, period_secs: u64 },
    Disabled,
}

impl RateLimitConfig {
    /// Dual-bucket limiter without hourly windows.
    pub fn dual(
        read_limit: u32,
        write_limit: u32,
        read_period_secs: u64,
        write_period_secs: u64,
    ) -> Self {
        Self::Dual {
            read_limit,
            write_limit,
            read_period_secs,
            write_period_secs,
            read_hourly_limit: 0,
            write_hourly_limit: 0,
            delete_hourly_limit: 0,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Dual { read_limit, write_limit, read_period_secs, write_period_secs, .. } => {
                if *read_limit > 0 && *read_period_secs == 0 {
                    return Err("read_period_secs must be greater than 0".to_string());
                }
                if *write_limit > 0 && *write_period_secs == 0 {
                    return Err("write_period_secs must be greater than 0".to_string());
                }
                Ok(())
            }
            Self::Global { limit, period_secs } => {
                if *limit > 0 && *period_secs == 0 {
                    return Err("period_secs must be greater than 0".to_string());
                }
                Ok(())
            }
            Self::Disabled => Ok(()),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::dual(20, 10, 10, 10)
    }
}

/// Bounds for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for one logical request (initial try + retries).
    pub max_attempts: u32,
    /// Base delay of the exponential fallback, in milliseconds.
    #[serde(with = "duration_millis")]
    pub wait_min: Duration,
    /// Cap of the exponential fallback, in milliseconds.
    #[serde(with = "duration_millis")]
    pub wait_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_min: Duration::from_millis(DEFAULT_RETRY_WAIT_MIN_MS),
            wait_max: Duration::from_millis(DEFAULT_RETRY_WAIT_MAX_MS),
        }
    }
}

/// How a session is judged expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Fixed lifetime counted from the last refresh.
    FixedTimeout {
        #[serde(with = "duration_millis")]
        timeout: Duration,
    },
    /// Provider-stated expiry minus a safety margin.
    ProviderExpiry {
        #[serde(with = "duration_millis")]
        margin: Duration,
    },
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::ProviderExpiry { margin: Duration::from_secs(DEFAULT_EXPIRY_MARGIN_SECS) }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub expiry: ExpiryPolicy,
    /// Interval of the proactive keep-alive refresh, for providers that
    /// require one. `None` disables the background ticker.
    pub keep_alive_ms: Option<u64>,
}

impl SessionConfig {
    pub fn keep_alive(&self) -> Option<Duration> {
        self.keep_alive_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    #[serde(with = "duration_millis")]
    pub ttl: Duration,
    #[serde(with = "duration_millis")]
    pub tti: Duration,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            tti: Duration::from_secs(DEFAULT_CACHE_TTI_SECS),
            max_capacity: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

/// Complete configuration of one service client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL; when absent the preset's default host is used.
    pub base_url: Option<String>,
    pub user_agent: String,
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            session: SessionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `SdkError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.retry.max_attempts == 0 {
            return Err(SdkError::Config("retry.max_attempts must be greater than 0".into()));
        }
        if self.retry.wait_min > self.retry.wait_max {
            return Err(SdkError::Config("retry.wait_min must not exceed retry.wait_max".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(SdkError::Config("request_timeout must be greater than zero".into()));
        }
        self.rate_limit.validate().map_err(|e| SdkError::Config(format!("rate_limit: {e}")))?;
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SdkError::Config(format!("base_url must be http(s): {url}")));
            }
        }
        Ok(())
    }
}

/// Product lines with known quota shapes and session semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServicePreset {
    Zia,
    Zpa,
    Zcc,
    OneApi,
}

impl_label_conversions!(ServicePreset {
    Zia => "zia",
    Zpa => "zpa",
    Zcc => "zcc",
    OneApi => "oneapi",
});

impl ServicePreset {
    /// Default configuration for this product line.
    pub fn client_config(self) -> ClientConfig {
        let mut config = ClientConfig::default();
        match self {
            Self::Zia => {
                config.rate_limit = RateLimitConfig::Dual {
                    read_limit: 20,
                    write_limit: 10,
                    read_period_secs: 10,
                    write_period_secs: 10,
                    read_hourly_limit: 1000,
                    write_hourly_limit: 1000,
                    delete_hourly_limit: 400,
                };
                config.session = SessionConfig {
                    expiry: ExpiryPolicy::FixedTimeout {
                        timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
                    },
                    keep_alive_ms: Some(DEFAULT_KEEP_ALIVE_SECS * 1000),
                };
            }
            Self::Zpa => {
                config.rate_limit = RateLimitConfig::Global { limit: 20, period_secs: 10 };
            }
            Self::Zcc => {
                config.rate_limit =
                    RateLimitConfig::Global { limit: 100, period_secs: SECONDS_PER_HOUR };
            }
            Self::OneApi => {
                config.rate_limit = RateLimitConfig::dual(20, 10, 10, 10);
            }
        }
        config
    }

    /// Default API base URL for this product line in `cloud`.
    pub fn default_base_url(self, cloud: Cloud) -> String {
        format!("https://{}.{}", self, cloud.host_suffix())
    }
}
