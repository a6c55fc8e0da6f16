//! Unit tests for the TTL/LRU cache manager

use sentra::cache::CacheManager;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[test]
fn get_returns_unexpired_values() {
    let cache: CacheManager<i32> = CacheManager::new(10, Duration::from_secs(60));
    cache.insert("a".to_string(), 1, None);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.get("missing"), None);
}

#[test]
fn expired_entries_are_not_visible() {
    let cache: CacheManager<i32> = CacheManager::new(10, Duration::from_millis(20));
    cache.insert("a".to_string(), 1, None);
    assert_eq!(cache.get("a"), Some(1));

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(cache.get("a"), None);
}

#[test]
fn get_or_compute_recomputes_after_ttl() {
    let cache: CacheManager<i32> = CacheManager::new(10, Duration::from_millis(20));
    let calls = AtomicU32::new(0);
    let compute = || {
        calls.fetch_add(1, Ordering::SeqCst);
        42
    };

    assert_eq!(cache.get_or_compute("k", None, compute), 42);
    assert_eq!(cache.get_or_compute("k", None, compute), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(cache.get_or_compute("k", None, compute), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn inserting_past_capacity_evicts_least_recently_used() {
    let cache: CacheManager<i32> = CacheManager::new(3, Duration::from_secs(60));
    cache.insert("a".to_string(), 1, None);
    std::thread::sleep(Duration::from_millis(5));
    cache.insert("b".to_string(), 2, None);
    std::thread::sleep(Duration::from_millis(5));
    cache.insert("c".to_string(), 3, None);
    std::thread::sleep(Duration::from_millis(5));

    // Touch a and c so b is the least recently used
    cache.get("a");
    std::thread::sleep(Duration::from_millis(5));
    cache.get("c");
    std::thread::sleep(Duration::from_millis(5));

    cache.insert("d".to_string(), 4, None);

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get("b"), None);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.get("c"), Some(3));
    assert_eq!(cache.get("d"), Some(4));
}

#[test]
fn overwriting_existing_key_does_not_evict() {
    let cache: CacheManager<i32> = CacheManager::new(2, Duration::from_secs(60));
    cache.insert("a".to_string(), 1, None);
    cache.insert("b".to_string(), 2, None);
    cache.insert("a".to_string(), 10, None);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("a"), Some(10));
    assert_eq!(cache.get("b"), Some(2));
}

#[test]
fn sweep_removes_only_expired_entries() {
    let cache: CacheManager<i32> = CacheManager::new(10, Duration::from_secs(60));
    cache.insert("short".to_string(), 1, Some(Duration::from_millis(10)));
    cache.insert("long".to_string(), 2, Some(Duration::from_secs(60)));

    std::thread::sleep(Duration::from_millis(20));
    let removed = cache.sweep();

    assert_eq!(removed, 1);
    assert_eq!(cache.get("long"), Some(2));
}

#[tokio::test]
async fn background_sweeper_reaps_expired_entries() {
    let cache = std::sync::Arc::new(CacheManager::<i32>::new(
        10,
        Duration::from_millis(10),
    ));
    cache.insert("a".to_string(), 1, None);

    cache.clone().start_sweeper(Duration::from_millis(15)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    cache.stop_sweeper().await;

    assert!(cache.is_empty());
}
