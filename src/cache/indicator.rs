//! Indicator-value cache keyed by (symbol, timeframe, indicator, params)
//!
//! On top of the TTL/LRU rules, entries are invalidated when the bar count
//! changes — a new bar means the cached value was computed from stale
//! history even if its TTL has not elapsed.

use crate::cache::manager::{CacheManager, CacheStats};
use crate::models::market::MarketData;
use crate::providers::IndicatorSource;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct CachedIndicator {
    value: f64,
    bar_count: usize,
}

pub struct IndicatorCache {
    inner: CacheManager<CachedIndicator>,
}

impl IndicatorCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: CacheManager::new(capacity, ttl),
        }
    }

    fn cache_key(market: &MarketData, indicator: &str, params: &HashMap<String, Value>) -> String {
        // BTreeMap gives a stable serialization order for the params part
        let ordered: BTreeMap<&String, &Value> = params.iter().collect();
        let params_key = serde_json::to_string(&ordered).unwrap_or_default();
        format!(
            "{}:{}:{}:{}",
            market.symbol, market.timeframe, indicator, params_key
        )
    }

    /// Cached value for the current bar count, else compute and store.
    /// `None` results are never cached.
    pub fn get_or_compute<F>(
        &self,
        market: &MarketData,
        indicator: &str,
        params: &HashMap<String, Value>,
        compute: F,
    ) -> Option<f64>
    where
        F: FnOnce() -> Option<f64>,
    {
        let key = Self::cache_key(market, indicator, params);
        let bar_count = market.bar_count();

        if let Some(entry) = self.inner.get(&key) {
            if entry.bar_count == bar_count {
                return Some(entry.value);
            }
            self.inner.remove(&key);
        }

        let value = compute()?;
        self.inner.insert(key, CachedIndicator { value, bar_count }, None);
        Some(value)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }
}

/// Indicator source wrapper that consults the cache before delegating
pub struct CachedIndicatorSource {
    source: Arc<dyn IndicatorSource>,
    cache: Arc<IndicatorCache>,
}

impl CachedIndicatorSource {
    pub fn new(source: Arc<dyn IndicatorSource>, cache: Arc<IndicatorCache>) -> Self {
        Self { source, cache }
    }
}

impl IndicatorSource for CachedIndicatorSource {
    fn indicator_value(
        &self,
        market: &MarketData,
        indicator: &str,
        params: &HashMap<String, Value>,
    ) -> Option<f64> {
        self.cache.get_or_compute(market, indicator, params, || {
            self.source.indicator_value(market, indicator, params)
        })
    }
}
