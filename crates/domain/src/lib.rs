//! # zsdk Domain
//!
//! Plain types shared by every zsdk crate.
//!
//! This crate contains:
//! - The error taxonomy surfaced to resource-layer callers
//! - Client configuration structures and per-product presets
//! - The credentials bundle handed to session exchanges
//! - Transport constants
//!
//! ## Architecture
//! - No dependencies on other zsdk crates
//! - No I/O; loaders live in `zsdk-infra`

pub mod config;
pub mod constants;
pub mod credentials;
pub mod errors;
pub mod macros;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use credentials::{Cloud, Credentials};
pub use errors::*;
