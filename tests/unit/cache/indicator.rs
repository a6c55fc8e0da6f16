//! Unit tests for the indicator cache

use chrono::Utc;
use sentra::cache::IndicatorCache;
use sentra::models::market::{Bar, MarketData, Timeframe};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn market_with_closes(closes: &[f64]) -> MarketData {
    let bars = closes
        .iter()
        .map(|&c| Bar::new(Utc::now(), c, c + 0.1, c - 0.1, c, 100.0))
        .collect();
    MarketData::new("EURUSD", Timeframe::M5, bars)
}

#[test]
fn caches_by_symbol_timeframe_indicator_and_params() {
    let cache = IndicatorCache::new(100, Duration::from_secs(60));
    let market = market_with_closes(&[1.0, 2.0, 3.0]);
    let calls = AtomicU32::new(0);

    let mut params = HashMap::new();
    params.insert("period".to_string(), serde_json::Value::from(14u64));

    let compute = || {
        calls.fetch_add(1, Ordering::SeqCst);
        Some(55.0)
    };
    assert_eq!(
        cache.get_or_compute(&market, "RSI", &params, compute),
        Some(55.0)
    );
    assert_eq!(
        cache.get_or_compute(&market, "RSI", &params, compute),
        Some(55.0)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Different params form a different key
    let mut other_params = HashMap::new();
    other_params.insert("period".to_string(), serde_json::Value::from(7u64));
    cache.get_or_compute(&market, "RSI", &other_params, compute);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn bar_count_change_invalidates_before_ttl() {
    let cache = IndicatorCache::new(100, Duration::from_secs(60));
    let market = market_with_closes(&[1.0, 2.0, 3.0]);
    let calls = AtomicU32::new(0);
    let compute = || {
        calls.fetch_add(1, Ordering::SeqCst);
        Some(1.5)
    };

    cache.get_or_compute(&market, "EMA", &HashMap::new(), compute);
    cache.get_or_compute(&market, "EMA", &HashMap::new(), compute);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A new bar arrived; the TTL has not elapsed but the value is stale
    let grown = market_with_closes(&[1.0, 2.0, 3.0, 4.0]);
    cache.get_or_compute(&grown, "EMA", &HashMap::new(), compute);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn none_results_are_not_cached() {
    let cache = IndicatorCache::new(100, Duration::from_secs(60));
    let market = market_with_closes(&[1.0]);
    let calls = AtomicU32::new(0);
    let compute = || {
        calls.fetch_add(1, Ordering::SeqCst);
        None
    };

    assert_eq!(cache.get_or_compute(&market, "RSI", &HashMap::new(), compute), None);
    assert_eq!(cache.get_or_compute(&market, "RSI", &HashMap::new(), compute), None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
