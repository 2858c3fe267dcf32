//! Logging capability handed to the transport
//!
//! The transport only ever needs to emit one formatted line at a time, so the
//! capability is exactly that: [`Logger::printf`]. Structured events elsewhere
//! in the workspace go straight through `tracing`.

pub mod logger;

pub use logger::{Logger, NoopLogger, TracingLogger};
