//! Unit tests for the filter evaluator

use chrono::{TimeZone, Utc};
use sentra::evaluators::FilterEvaluator;
use sentra::models::market::SymbolInfo;
use sentra::models::strategy::{Filter, FilterKind, TradingSession};

fn symbol_info(point: f64, spread: f64) -> SymbolInfo {
    SymbolInfo {
        symbol: "EURUSD".to_string(),
        point,
        spread,
        bid: 1.1000,
        ask: 1.1000 + spread,
    }
}

fn enabled(kind: FilterKind) -> Filter {
    Filter {
        enabled: true,
        kind,
    }
}

fn at(hour: u32, minute: u32) -> chrono::DateTime<Utc> {
    // 2025-06-02 is a Monday
    Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
}

#[test]
fn empty_filter_list_passes() {
    let outcome = FilterEvaluator::evaluate_filters(&[], &symbol_info(0.00001, 0.0001), None, at(12, 0));
    assert!(outcome.passed);
    assert!(outcome.results.is_empty());
}

#[test]
fn disabled_filters_are_skipped() {
    let filters = vec![Filter {
        enabled: false,
        kind: FilterKind::Spread { max_pips: 0.0 },
    }];
    let outcome =
        FilterEvaluator::evaluate_filters(&filters, &symbol_info(0.00001, 0.0005), None, at(12, 0));
    assert!(outcome.passed);
    assert!(outcome.results.is_empty());
}

#[test]
fn overnight_time_window_spans_midnight() {
    let filters = vec![enabled(FilterKind::Time {
        start: "22:00".to_string(),
        end: "02:00".to_string(),
    })];
    let info = symbol_info(0.00001, 0.0001);

    assert!(FilterEvaluator::evaluate_filters(&filters, &info, None, at(23, 30)).passed);
    assert!(FilterEvaluator::evaluate_filters(&filters, &info, None, at(1, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&filters, &info, None, at(10, 0)).passed);
}

#[test]
fn daytime_window_is_inclusive() {
    let filters = vec![enabled(FilterKind::Time {
        start: "08:00".to_string(),
        end: "17:00".to_string(),
    })];
    let info = symbol_info(0.00001, 0.0001);

    assert!(FilterEvaluator::evaluate_filters(&filters, &info, None, at(8, 0)).passed);
    assert!(FilterEvaluator::evaluate_filters(&filters, &info, None, at(17, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&filters, &info, None, at(17, 1)).passed);
}

#[test]
fn invalid_time_spec_fails_that_filter_only() {
    let filters = vec![
        enabled(FilterKind::Time {
            start: "25:00".to_string(),
            end: "02:00".to_string(),
        }),
        enabled(FilterKind::News),
    ];
    let outcome =
        FilterEvaluator::evaluate_filters(&filters, &symbol_info(0.00001, 0.0001), None, at(12, 0));
    assert!(!outcome.passed);
    assert_eq!(outcome.results.len(), 2);
    assert!(!outcome.results[0].passed);
    assert!(outcome.results[1].passed);
}

#[test]
fn session_filter_checks_utc_hour_membership() {
    let info = symbol_info(0.00001, 0.0001);
    let asian_only = vec![enabled(FilterKind::Session {
        allowed_sessions: vec![TradingSession::Asian],
    })];

    assert!(FilterEvaluator::evaluate_filters(&asian_only, &info, None, at(3, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&asian_only, &info, None, at(12, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&asian_only, &info, None, at(20, 0)).passed);

    let ny_only = vec![enabled(FilterKind::Session {
        allowed_sessions: vec![TradingSession::NewYork],
    })];
    assert!(FilterEvaluator::evaluate_filters(&ny_only, &info, None, at(20, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&ny_only, &info, None, at(12, 0)).passed);
}

#[test]
fn spread_filter_converts_to_pips() {
    // 0.00020 spread at 0.00001 point is 2.0 pips
    let info = symbol_info(0.00001, 0.0002);
    let loose = vec![enabled(FilterKind::Spread { max_pips: 3.0 })];
    let tight = vec![enabled(FilterKind::Spread { max_pips: 1.0 })];

    assert!(FilterEvaluator::evaluate_filters(&loose, &info, None, at(12, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&tight, &info, None, at(12, 0)).passed);
}

#[test]
fn volatility_filter_passes_when_figure_unavailable() {
    let filters = vec![enabled(FilterKind::Volatility {
        min: Some(0.001),
        max: Some(0.01),
    })];
    let info = symbol_info(0.00001, 0.0001);

    assert!(FilterEvaluator::evaluate_filters(&filters, &info, None, at(12, 0)).passed);
    assert!(FilterEvaluator::evaluate_filters(&filters, &info, Some(0.005), at(12, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&filters, &info, Some(0.0001), at(12, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&filters, &info, Some(0.05), at(12, 0)).passed);
}

#[test]
fn day_of_week_filter_uses_sunday_zero_indexing() {
    // at() dates fall on a Monday, day 1
    let info = symbol_info(0.00001, 0.0001);
    let weekdays = vec![enabled(FilterKind::DayOfWeek {
        allowed_days: vec![1, 2, 3, 4, 5],
    })];
    let weekend = vec![enabled(FilterKind::DayOfWeek {
        allowed_days: vec![0, 6],
    })];

    assert!(FilterEvaluator::evaluate_filters(&weekdays, &info, None, at(12, 0)).passed);
    assert!(!FilterEvaluator::evaluate_filters(&weekend, &info, None, at(12, 0)).passed);
}

#[test]
fn news_filter_always_passes() {
    let filters = vec![enabled(FilterKind::News)];
    let outcome =
        FilterEvaluator::evaluate_filters(&filters, &symbol_info(0.00001, 0.0001), None, at(12, 0));
    assert!(outcome.passed);
}

#[test]
fn unknown_filter_type_fails_open() {
    let filters: Vec<Filter> =
        serde_json::from_str(r#"[{"enabled": true, "type": "lunarPhase"}]"#).unwrap();
    let outcome =
        FilterEvaluator::evaluate_filters(&filters, &symbol_info(0.00001, 0.0001), None, at(12, 0));
    assert!(outcome.passed);
    assert_eq!(outcome.results[0].filter, "unknown");
}

#[test]
fn all_enabled_filters_must_pass() {
    let filters = vec![
        enabled(FilterKind::News),
        enabled(FilterKind::Spread { max_pips: 0.5 }),
    ];
    let outcome =
        FilterEvaluator::evaluate_filters(&filters, &symbol_info(0.00001, 0.0002), None, at(12, 0));
    assert!(!outcome.passed);
    assert_eq!(outcome.results.len(), 2);
}
