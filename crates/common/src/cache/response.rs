use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;
use tracing::debug;

/// A cached successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Arc<[u8]>,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Arc<[u8]>>) -> Self {
        Self { status, body: body.into() }
    }
}

/// Cache keyed by request fingerprint.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedResponse>;

    fn set(&self, key: &str, value: CachedResponse, ttl: Duration);

    /// Drop every entry; used after any successful write.
    fn invalidate_all(&self);

    /// Release the cache. Later calls are no-ops and `get` misses.
    fn close(&self);
}

#[derive(Debug, Clone)]
struct Entry {
    response: CachedResponse,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// `moka`-backed [`ResponseCache`] with per-entry TTL and a shared
/// time-to-idle.
#[derive(Clone)]
pub struct MokaResponseCache {
    cache: Cache<String, Entry>,
    closed: Arc<AtomicBool>,
}

impl MokaResponseCache {
    /// Create a cache holding at most `max_capacity` responses; entries idle
    /// for longer than `time_to_idle` are evicted regardless of their TTL.
    #[must_use]
    pub fn new(max_capacity: u64, time_to_idle: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_idle(time_to_idle)
                .expire_after(PerEntryTtl)
                .build(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of live entries (approximate; pending maintenance is flushed
    /// first).
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ResponseCache for MokaResponseCache {
    fn get(&self, key: &str) -> Option<CachedResponse> {
        if self.is_closed() {
            return None;
        }
        self.cache.get(key).map(|entry| entry.response)
    }

    fn set(&self, key: &str, value: CachedResponse, ttl: Duration) {
        if self.is_closed() || ttl.is_zero() {
            return;
        }
        self.cache.insert(key.to_string(), Entry { response: value, ttl });
    }

    fn invalidate_all(&self) {
        self.cache.invalidate_all();
        debug!("response cache cleared");
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.cache.invalidate_all();
            debug!("response cache closed");
        }
    }
}
