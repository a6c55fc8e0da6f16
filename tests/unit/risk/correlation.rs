//! Unit tests for the correlation risk engine

use sentra::models::market::{OpenPosition, TradeDirection};
use sentra::risk::correlation::pearson;
use sentra::risk::{CorrelationConfig, CorrelationRiskEngine, RiskAction};
use std::time::Duration;

fn position(ticket: u64, symbol: &str) -> OpenPosition {
    OpenPosition {
        ticket,
        symbol: symbol.to_string(),
        direction: TradeDirection::Buy,
        volume: 1.0,
    }
}

#[test]
fn no_open_positions_proceeds_at_full_size() {
    let engine = CorrelationRiskEngine::with_defaults();
    let decision = engine.assess("EURUSD", 1.0, &[]);
    assert_eq!(decision.action, RiskAction::Proceed);
    assert_eq!(decision.adjusted_volume, 1.0);
    assert_eq!(decision.confidence, 100);
}

#[test]
fn moderate_correlation_reduces_to_seventy_percent() {
    let engine = CorrelationRiskEngine::with_defaults();
    engine.set_correlation("EURUSD", "GBPUSD", 0.75, 120);

    let decision = engine.assess("EURUSD", 1.0, &[position(1, "GBPUSD")]);
    assert_eq!(decision.action, RiskAction::ReduceSize);
    assert!((decision.adjusted_volume - 0.7).abs() < 1e-9);
    assert_eq!(decision.confidence, 85);
    assert_eq!(decision.correlated.len(), 1);
}

#[test]
fn high_correlation_reduces_to_half() {
    let engine = CorrelationRiskEngine::with_defaults();
    engine.set_correlation("EURUSD", "GBPUSD", 0.85, 120);

    let decision = engine.assess("EURUSD", 1.0, &[position(1, "GBPUSD")]);
    assert_eq!(decision.action, RiskAction::ReduceSize);
    assert!((decision.adjusted_volume - 0.5).abs() < 1e-9);
    assert_eq!(decision.confidence, 75);
}

#[test]
fn identical_symbol_is_trivially_correlated() {
    let engine = CorrelationRiskEngine::with_defaults();
    let decision = engine.assess("EURUSD", 1.0, &[position(7, "EURUSD")]);
    // Coefficient 1.0 lands in the extreme tier
    assert_eq!(decision.action, RiskAction::ReduceSize);
    assert!((decision.adjusted_volume - 0.3).abs() < 1e-9);
    assert_eq!(decision.confidence, 60);
}

#[test]
fn uncorrelated_positions_do_not_count() {
    let engine = CorrelationRiskEngine::with_defaults();
    engine.set_correlation("EURUSD", "USDJPY", 0.2, 120);

    let decision = engine.assess("EURUSD", 1.0, &[position(1, "USDJPY")]);
    assert_eq!(decision.action, RiskAction::Proceed);
    assert_eq!(decision.adjusted_volume, 1.0);
}

#[test]
fn matrix_is_symmetric() {
    let engine = CorrelationRiskEngine::with_defaults();
    engine.set_correlation("EURUSD", "GBPUSD", 0.75, 120);
    assert_eq!(engine.correlation("GBPUSD", "EURUSD"), 0.75);
    assert_eq!(engine.correlation("EURUSD", "GBPUSD"), 0.75);
}

#[test]
fn stale_entries_fall_back_to_static_table() {
    let engine = CorrelationRiskEngine::new(CorrelationConfig {
        threshold: 0.7,
        refresh_window: Duration::ZERO,
    });
    // Cached value is immediately stale, so the static table wins
    engine.set_correlation("EURUSD", "USDCHF", 0.1, 120);
    assert_eq!(engine.correlation("EURUSD", "USDCHF"), -0.92);
}

#[test]
fn unknown_pairs_default_to_non_significant() {
    let engine = CorrelationRiskEngine::with_defaults();
    assert_eq!(engine.correlation("EURUSD", "BTCUSD"), 0.1);
}

#[test]
fn coefficients_are_clamped_to_unit_range() {
    let engine = CorrelationRiskEngine::with_defaults();
    engine.set_correlation("EURUSD", "GBPUSD", 3.5, 120);
    assert_eq!(engine.correlation("EURUSD", "GBPUSD"), 1.0);
}

#[test]
fn pearson_needs_thirty_paired_samples() {
    let xs: Vec<f64> = (0..29).map(|i| i as f64).collect();
    let ys = xs.clone();
    assert_eq!(pearson(&xs, &ys), 0.0);

    let xs: Vec<f64> = (0..30).map(|i| i as f64).collect();
    let ys = xs.clone();
    assert!((pearson(&xs, &ys) - 1.0).abs() < 1e-12);
}

#[test]
fn pearson_handles_degenerate_series() {
    let xs = vec![1.0; 40];
    let ys: Vec<f64> = (0..40).map(|i| i as f64).collect();
    // Zero variance on one side: denominator collapses
    assert_eq!(pearson(&xs, &ys), 0.0);

    let mismatched: Vec<f64> = (0..35).map(|i| i as f64).collect();
    assert_eq!(pearson(&mismatched, &ys), 0.0);
}

#[test]
fn pearson_detects_inverse_relationship() {
    let xs: Vec<f64> = (0..40).map(|i| i as f64).collect();
    let ys: Vec<f64> = (0..40).map(|i| -(i as f64)).collect();
    assert!((pearson(&xs, &ys) + 1.0).abs() < 1e-12);
}

#[test]
fn update_from_series_stores_the_coefficient() {
    let engine = CorrelationRiskEngine::with_defaults();
    let xs: Vec<f64> = (0..40).map(|i| i as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();

    let coefficient = engine.update_from_series("EURUSD", "GBPUSD", &xs, &ys);
    assert!((coefficient - 1.0).abs() < 1e-12);
    assert_eq!(engine.correlation("EURUSD", "GBPUSD"), coefficient);
}
