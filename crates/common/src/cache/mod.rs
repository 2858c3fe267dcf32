//! Response cache consumed by service clients
//!
//! Service clients treat the cache as a black box keyed by request
//! fingerprint: [`ResponseCache::get`], [`ResponseCache::set`] with a
//! per-entry TTL, [`ResponseCache::invalidate_all`] after writes, and
//! [`ResponseCache::close`] on shutdown. [`MokaResponseCache`] is the
//! in-process implementation.

pub mod response;

pub use response::{CachedResponse, MokaResponseCache, ResponseCache};
