//! Admission control for outgoing requests
//!
//! - [`clock`]: time abstraction so window arithmetic is testable without
//!   sleeping
//! - [`rate_limiter`]: sliding-window limiters and the [`RequestLimiter`]
//!   seam the transport consumes
//!
//! Limiters never sleep. They answer "may this request go now, and if not,
//! how long until it may" and leave the waiting to the caller.

pub mod clock;
#[cfg(feature = "runtime")]
pub mod rate_limiter;

pub use clock::{Clock, MockClock, SystemClock};
#[cfg(feature = "runtime")]
pub use rate_limiter::{
    Admission, GlobalLimiter, OperationClass, RequestLimiter, SlidingWindowLimiter, Unlimited,
    WindowLimits,
};
