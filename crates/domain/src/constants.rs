//! Transport constants
//!
//! Centralized location for the defaults shared by configuration and the
//! transport implementation.

// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;
pub const DEFAULT_RETRY_WAIT_MIN_MS: u64 = 2_000;
pub const DEFAULT_RETRY_WAIT_MAX_MS: u64 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 240_000;

// Session defaults
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_EXPIRY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 25 * 60;
pub const DEFAULT_SESSION_RELEASE_TIMEOUT_SECS: u64 = 10;

// Response cache defaults
pub const DEFAULT_CACHE_TTL_SECS: u64 = 10 * 60;
pub const DEFAULT_CACHE_TTI_SECS: u64 = 8 * 60;
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;

// Limiter periods
pub const SECONDS_PER_HOUR: u64 = 3_600;

// Provider backpressure hints
pub const RETRY_AFTER_HEADER: &str = "Retry-After";
pub const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER_BODY_FIELD: &str = "Retry-After";

pub const DEFAULT_USER_AGENT: &str = concat!("zsdk/", env!("CARGO_PKG_VERSION"));
