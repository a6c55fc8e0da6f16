//! Generic TTL cache with LRU eviction
//!
//! Entries are visible to readers only while unexpired; expired entries are
//! dropped lazily on lookup or reaped by the optional background sweep.
//! Concurrent callers computing the same key may each compute once — the
//! cache does not deduplicate in-flight computations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
    last_access: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct CacheManager<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    capacity: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    sweeper: RwLock<Option<JoinHandle<()>>>,
}

impl<V: Clone + Send + 'static> CacheManager<V> {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            sweeper: RwLock::new(None),
        }
    }

    /// Cached value if present and unexpired; expired entries are removed
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.access_count += 1;
                entry.last_access = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cached value, or compute, store, and return it. The compute closure
    /// runs outside the lock.
    pub fn get_or_compute<F>(&self, key: &str, ttl: Option<Duration>, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute();
        self.insert(key.to_string(), value.clone(), ttl);
        value
    }

    pub fn insert(&self, key: String, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            Self::evict_lru(&mut entries);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                access_count: 0,
                last_access: now,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            trace!(removed, remaining = entries.len(), "cache sweep");
        }
        removed
    }

    fn evict_lru(entries: &mut HashMap<String, CacheEntry<V>>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| (e.last_access, e.access_count, e.created_at))
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            debug!(key = %key, "evicting least-recently-used cache entry");
            entries.remove(&key);
        }
    }
}

impl<V: Clone + Send + Sync + 'static> CacheManager<V> {
    /// Start the periodic expiry sweep
    pub async fn start_sweeper(self: std::sync::Arc<Self>, interval: Duration) {
        let cache = std::sync::Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep();
            }
        });
        let mut sweeper = self.sweeper.write().await;
        if let Some(old) = sweeper.replace(handle) {
            old.abort();
        }
    }

    /// Stop the periodic sweep; idempotent
    pub async fn stop_sweeper(&self) {
        let mut sweeper = self.sweeper.write().await;
        if let Some(handle) = sweeper.take() {
            handle.abort();
        }
    }
}
