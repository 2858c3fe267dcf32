//! Error conversions for infrastructure dependencies.

mod conversions;

pub use conversions::{is_transient, InfraError};
