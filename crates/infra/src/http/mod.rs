//! HTTP transport: response classification, backoff and the retrying client.

pub mod backoff;
pub mod classify;
pub mod client;

pub(crate) use client::sleep_or_cancel;

pub use backoff::BackoffPolicy;
pub use classify::{classify, ConflictSignal, ResponseClass};
pub use client::{RetryingTransport, RetryingTransportBuilder, TransportResponse};
