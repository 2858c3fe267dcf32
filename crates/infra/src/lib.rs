//! # zsdk Infrastructure
//!
//! The resilient transport that every zsdk resource layer sits on.
//!
//! This crate contains:
//! - The retrying HTTP transport and its backoff policy
//! - Response classification (throttling, contention, auth rejection)
//! - Session exchanges and the single-flight session manager
//! - The per-product [`ServiceClient`]
//! - Configuration and credential loaders
//!
//! ## Architecture
//! - Builds on the limiters, clock and cache in `zsdk-common`
//! - Surfaces `zsdk-domain::SdkError` to callers
//! - Contains all "impure" code (network, environment, filesystem)

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;

// Re-export commonly used items
pub use api::{ServiceClient, ServiceClientBuilder};
pub use auth::{
    ApiKeyExchange, ClientCredentialsExchange, CredentialExchange, IssuedSession, Session,
    SessionCredential, SessionManager,
};
pub use config::{limiter_from_config, CredentialsLoader, EnvCredentialsLoader};
pub use errors::InfraError;
pub use http::{
    BackoffPolicy, ResponseClass, RetryingTransport, RetryingTransportBuilder, TransportResponse,
};
