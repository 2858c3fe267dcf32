//! Runtime building blocks shared by zsdk service clients.
//!
//! Nothing here performs HTTP; the transport in `zsdk-infra` composes these
//! pieces.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clock abstraction, request fingerprints
//! - `runtime`: sliding-window limiters, response cache, logger capability
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod fingerprint;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod observability;
#[cfg(feature = "foundation")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", all(test, feature = "runtime")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{CachedResponse, MokaResponseCache, ResponseCache};
#[cfg(feature = "foundation")]
pub use fingerprint::request_fingerprint;
#[cfg(feature = "runtime")]
pub use observability::{Logger, NoopLogger, TracingLogger};
#[cfg(feature = "foundation")]
pub use resilience::{Clock, MockClock, SystemClock};
#[cfg(feature = "runtime")]
pub use resilience::{
    Admission, GlobalLimiter, OperationClass, RequestLimiter, SlidingWindowLimiter, Unlimited,
    WindowLimits,
};
