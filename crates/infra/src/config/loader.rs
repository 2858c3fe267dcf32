//! Configuration loader
//!
//! Loads a [`ClientConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables, layered on top of
//!    the preset's defaults
//! 2. If `ZSDK_BASE_URL` is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `ZSDK_BASE_URL`: API base URL (required for env loading)
//! - `ZSDK_MAX_RETRIES`: Total attempts per logical request
//! - `ZSDK_RETRY_WAIT_MIN_SECS`: Base delay of the exponential backoff
//! - `ZSDK_RETRY_WAIT_MAX_SECS`: Cap of the exponential backoff
//! - `ZSDK_REQUEST_TIMEOUT_SECS`: Per-attempt HTTP timeout
//! - `ZSDK_CACHE_ENABLED`: Whether GET responses are cached (true/false)
//! - `ZSDK_CACHE_TTL_SECS`: Lifetime of cached responses
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./zsdk.toml` or `./zsdk.json` (current working directory)
//! 2. `../zsdk.toml` or `../zsdk.json` (parent directory)
//! 3. The same names next to the executable
//!
//! Files hold a complete `ClientConfig`; omitted fields take the generic
//! defaults, not the preset's.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use zsdk_domain::{ClientConfig, Result, SdkError, ServicePreset};

const CONFIG_FILE_NAMES: [&str; 2] = ["zsdk.toml", "zsdk.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `SdkError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The resulting configuration fails validation
pub fn load(preset: ServicePreset) -> Result<ClientConfig> {
    match load_from_env(preset) {
        Ok(config) => {
            tracing::info!(%preset, "Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables on top of `preset`'s
/// defaults
///
/// # Errors
/// Returns `SdkError::Config` if `ZSDK_BASE_URL` is missing or a variable
/// has an invalid value.
pub fn load_from_env(preset: ServicePreset) -> Result<ClientConfig> {
    let mut config = preset.client_config();
    config.base_url = Some(env_var("ZSDK_BASE_URL")?);

    if let Some(attempts) = env_parse::<u32>("ZSDK_MAX_RETRIES")? {
        config.retry.max_attempts = attempts;
    }
    if let Some(secs) = env_parse::<f64>("ZSDK_RETRY_WAIT_MIN_SECS")? {
        config.retry.wait_min = env_duration("ZSDK_RETRY_WAIT_MIN_SECS", secs)?;
    }
    if let Some(secs) = env_parse::<f64>("ZSDK_RETRY_WAIT_MAX_SECS")? {
        config.retry.wait_max = env_duration("ZSDK_RETRY_WAIT_MAX_SECS", secs)?;
    }
    if let Some(secs) = env_parse::<u64>("ZSDK_REQUEST_TIMEOUT_SECS")? {
        config.request_timeout = Duration::from_secs(secs);
    }
    config.cache.enabled = env_bool("ZSDK_CACHE_ENABLED", config.cache.enabled);
    if let Some(secs) = env_parse::<u64>("ZSDK_CACHE_TTL_SECS")? {
        config.cache.ttl = Duration::from_secs(secs);
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `SdkError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or the configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SdkError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SdkError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SdkError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content; the format follows the file
/// extension.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SdkError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SdkError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SdkError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `SdkError::Config` if the variable is not set.
pub(crate) fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SdkError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SdkError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_duration(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| SdkError::Config(format!("Invalid value for {key}: {e}")))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
