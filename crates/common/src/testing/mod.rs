//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory implementations of the capability traits
//!   (`RecordingLogger`, `CountingLimiter`)
//! - [`MockClock`] is re-exported for deterministic limiter tests
//!
//! ## Usage
//!
//! ```rust
//! use zsdk_common::testing::{MockClock, RecordingLogger};
//! use zsdk_common::Logger;
//!
//! let clock = MockClock::new();
//! clock.advance(std::time::Duration::from_secs(5));
//!
//! let logger = RecordingLogger::new();
//! logger.printf(format_args!("hello {}", 1));
//! assert!(logger.contains("hello 1"));
//! ```

pub mod mocks;

pub use mocks::{CountingLimiter, RecordingLogger};

pub use crate::resilience::MockClock;
