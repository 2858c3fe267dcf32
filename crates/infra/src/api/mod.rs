//! Service client for zsdk resource layers
//!
//! One [`ServiceClient`] per product line and tenant. It owns its limiter,
//! transport, session manager and optional response cache; nothing is shared
//! between clients.

pub mod client;

pub use client::{ServiceClient, ServiceClientBuilder};
