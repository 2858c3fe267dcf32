//! Configuration and credential loading
//!
//! - [`loader`]: `ClientConfig` from environment variables or TOML/JSON files
//! - [`credentials`]: the [`CredentialsLoader`] seam and its env-backed
//!   implementation
//! - [`limits`]: limiter construction from the rate-limit section

pub mod credentials;
pub mod limits;
pub mod loader;

pub use credentials::{CredentialsLoader, EnvCredentialsLoader};
pub use limits::limiter_from_config;
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: once_cell::sync::Lazy<std::sync::Mutex<()>> =
    once_cell::sync::Lazy::new(|| std::sync::Mutex::new(()));
