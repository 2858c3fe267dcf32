//! Integration tests for the response cache

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use zsdk_common::{request_fingerprint, CachedResponse, MokaResponseCache, ResponseCache};

#[test]
fn test_fingerprint_keys_round_trip_through_cache() {
    let cache = MokaResponseCache::new(100, Duration::from_secs(60));
    let key = request_fingerprint("GET", "https://api.example.com/v1/roles");

    cache.set(&key, CachedResponse::new(200, b"[1,2]".to_vec()), Duration::from_secs(30));

    let hit = cache.get(&request_fingerprint("get", "https://api.example.com/v1/roles"));
    assert_eq!(hit.map(|r| r.body.to_vec()), Some(b"[1,2]".to_vec()));
}

#[test]
fn test_invalidate_all_clears_entries() {
    let cache = MokaResponseCache::new(100, Duration::from_secs(60));
    for i in 0..5 {
        cache.set(&format!("k{i}"), CachedResponse::new(200, vec![i]), Duration::from_secs(30));
    }
    assert_eq!(cache.entry_count(), 5);

    cache.invalidate_all();

    for i in 0..5 {
        assert!(cache.get(&format!("k{i}")).is_none());
    }
}

#[test]
fn test_idle_entries_are_evicted() {
    let cache = MokaResponseCache::new(100, Duration::from_millis(30));
    cache.set("idle", CachedResponse::new(200, b"x".to_vec()), Duration::from_secs(60));

    thread::sleep(Duration::from_millis(80));

    assert!(cache.get("idle").is_none());
}

#[test]
fn test_shared_across_threads() {
    let cache: Arc<dyn ResponseCache> =
        Arc::new(MokaResponseCache::new(1_000, Duration::from_secs(60)));

    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..50u8 {
                    let key = format!("{t}-{i}");
                    cache.set(&key, CachedResponse::new(200, vec![t, i]), Duration::from_secs(60));
                    assert_eq!(cache.get(&key).map(|r| r.body.to_vec()), Some(vec![t, i]));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread should not panic");
    }
}
