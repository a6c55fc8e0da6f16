//! Unit tests for the condition evaluator

use chrono::Utc;
use sentra::evaluators::ConditionEvaluator;
use sentra::indicators::BuiltinIndicators;
use sentra::models::market::{Bar, MarketData, Timeframe};
use sentra::models::strategy::{
    ComparisonOp, ComparisonTarget, Condition, RuleLogic, RuleSet,
};
use sentra::providers::IndicatorSource;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

fn market_with_closes(closes: &[f64]) -> MarketData {
    let bars = closes
        .iter()
        .map(|&c| Bar::new(Utc::now(), c, c + 0.1, c - 0.1, c, 100.0))
        .collect();
    MarketData::new("EURUSD", Timeframe::M15, bars)
}

fn condition(indicator: &str, operator: ComparisonOp, target: ComparisonTarget) -> Condition {
    Condition {
        indicator: indicator.to_string(),
        params: HashMap::new(),
        operator,
        target,
        enabled: true,
    }
}

/// Indicator source with canned values, for tests that pin the left side
struct StubIndicators(HashMap<String, f64>);

impl IndicatorSource for StubIndicators {
    fn indicator_value(
        &self,
        _market: &MarketData,
        indicator: &str,
        _params: &HashMap<String, Value>,
    ) -> Option<f64> {
        self.0.get(&indicator.to_ascii_uppercase()).copied()
    }
}

fn stub_evaluator(values: &[(&str, f64)]) -> ConditionEvaluator {
    let map = values
        .iter()
        .map(|(k, v)| (k.to_ascii_uppercase(), *v))
        .collect();
    ConditionEvaluator::new(Arc::new(StubIndicators(map)))
}

fn builtin_evaluator() -> ConditionEvaluator {
    ConditionEvaluator::new(Arc::new(BuiltinIndicators))
}

#[test]
fn disabled_condition_is_never_met() {
    let evaluator = stub_evaluator(&[("RSI", 99.0)]);
    let mut cond = condition("RSI", ComparisonOp::GreaterThan, ComparisonTarget::Number(1.0));
    cond.enabled = false;

    let market = market_with_closes(&[1.0, 2.0, 3.0]);
    let result = evaluator.evaluate_condition(&cond, &market);
    assert!(!result.met);
    assert!(result.reason.contains("disabled"));
    assert!(!evaluator.evaluate(&cond, &market));
}

#[test]
fn unavailable_indicator_is_not_met_with_reason() {
    let evaluator = stub_evaluator(&[]);
    let cond = condition("RSI", ComparisonOp::GreaterThan, ComparisonTarget::Number(50.0));
    let result = evaluator.evaluate_condition(&cond, &market_with_closes(&[1.0]));
    assert!(!result.met);
    assert!(result.reason.contains("unavailable"));
}

#[test]
fn numeric_comparisons_behave_as_named() {
    let evaluator = stub_evaluator(&[("RSI", 70.0)]);
    let market = market_with_closes(&[1.0, 1.1]);

    let cases = [
        (ComparisonOp::GreaterThan, 60.0, true),
        (ComparisonOp::GreaterThan, 70.0, false),
        (ComparisonOp::LessThan, 80.0, true),
        (ComparisonOp::GreaterEqual, 70.0, true),
        (ComparisonOp::LessEqual, 69.0, false),
    ];
    for (op, target, expected) in cases {
        let cond = condition("RSI", op, ComparisonTarget::Number(target));
        assert_eq!(evaluator.evaluate(&cond, &market), expected, "{:?} {}", op, target);
    }
}

#[test]
fn equality_uses_tolerance() {
    let evaluator = stub_evaluator(&[("RSI", 50.00005)]);
    let market = market_with_closes(&[1.0, 1.1]);

    let close = condition("RSI", ComparisonOp::Equal, ComparisonTarget::Number(50.0));
    assert!(evaluator.evaluate(&close, &market));

    let far = condition("RSI", ComparisonOp::Equal, ComparisonTarget::Number(50.1));
    assert!(!evaluator.evaluate(&far, &market));
}

#[test]
fn price_target_resolves_to_last_close() {
    let evaluator = stub_evaluator(&[("RSI", 2.0)]);
    let market = market_with_closes(&[1.0, 1.5]);
    let cond = condition(
        "RSI",
        ComparisonOp::GreaterThan,
        ComparisonTarget::Reference("price".to_string()),
    );
    let result = evaluator.evaluate_condition(&cond, &market);
    assert!(result.met);
    assert_eq!(result.target_value, Some(1.5));
}

#[test]
fn indicator_reference_resolves_with_period() {
    // SMA_3 over [1, 2, 3] is 2; last close 3 is above it
    let evaluator = builtin_evaluator();
    let market = market_with_closes(&[1.0, 2.0, 3.0]);
    let cond = condition(
        "price",
        ComparisonOp::GreaterThan,
        ComparisonTarget::Reference("SMA_3".to_string()),
    );
    let result = evaluator.evaluate_condition(&cond, &market);
    assert!(result.met);
    assert_eq!(result.target_value, Some(2.0));
}

#[test]
fn between_and_outside_are_not_yet_supported() {
    let evaluator = stub_evaluator(&[("RSI", 15.0)]);
    let market = market_with_closes(&[1.0, 1.1]);

    for op in [ComparisonOp::Between, ComparisonOp::Outside] {
        let cond = condition("RSI", op, ComparisonTarget::Number(10.0));
        let result = evaluator.evaluate_condition(&cond, &market);
        assert!(!result.met, "{:?} must evaluate to not met", op);
        assert!(result.reason.contains("not yet supported"));
    }
}

#[test]
fn crosses_above_needs_two_bars() {
    let evaluator = builtin_evaluator();
    let cond = condition(
        "price",
        ComparisonOp::CrossesAbove,
        ComparisonTarget::Number(1.1),
    );
    let result = evaluator.evaluate_condition(&cond, &market_with_closes(&[1.2]));
    assert!(!result.met);
    assert!(result.reason.contains("two bars"));
}

#[test]
fn crosses_above_detects_threshold_breach() {
    let evaluator = builtin_evaluator();
    let cond = condition(
        "price",
        ComparisonOp::CrossesAbove,
        ComparisonTarget::Number(1.1),
    );
    assert!(evaluator.evaluate(&cond, &market_with_closes(&[1.0, 1.2])));
    assert!(!evaluator.evaluate(&cond, &market_with_closes(&[1.2, 1.0])));
    // Already above beforehand: no cross
    assert!(!evaluator.evaluate(&cond, &market_with_closes(&[1.15, 1.2])));
}

#[test]
fn crosses_below_mirrors_crosses_above() {
    let evaluator = builtin_evaluator();
    let cond = condition(
        "price",
        ComparisonOp::CrossesBelow,
        ComparisonTarget::Number(1.1),
    );
    assert!(evaluator.evaluate(&cond, &market_with_closes(&[1.2, 1.0])));
    assert!(!evaluator.evaluate(&cond, &market_with_closes(&[1.0, 1.2])));
}

#[test]
fn crosses_only_apply_to_the_price_series() {
    let evaluator = stub_evaluator(&[("RSI", 55.0)]);
    let cond = condition(
        "RSI",
        ComparisonOp::CrossesAbove,
        ComparisonTarget::Number(50.0),
    );
    let result = evaluator.evaluate_condition(&cond, &market_with_closes(&[1.0, 1.2]));
    assert!(!result.met);
    assert!(result.reason.contains("not supported"));
}

#[test]
fn and_logic_requires_every_condition() {
    let evaluator = stub_evaluator(&[("RSI", 70.0)]);
    let market = market_with_closes(&[1.0, 1.1]);
    let rules = RuleSet {
        logic: RuleLogic::And,
        conditions: vec![
            condition("RSI", ComparisonOp::GreaterThan, ComparisonTarget::Number(60.0)),
            condition("RSI", ComparisonOp::LessThan, ComparisonTarget::Number(60.0)),
        ],
    };
    let result = evaluator.evaluate_rule_set(&rules, &market);
    assert!(!result.met);
    // Both conditions were still evaluated for the audit trail
    assert_eq!(result.results.len(), 2);
    assert!(result.results[0].met);
    assert!(!result.results[1].met);
}

#[test]
fn or_logic_accepts_any_condition() {
    let evaluator = stub_evaluator(&[("RSI", 70.0)]);
    let market = market_with_closes(&[1.0, 1.1]);
    let rules = RuleSet {
        logic: RuleLogic::Or,
        conditions: vec![
            condition("RSI", ComparisonOp::GreaterThan, ComparisonTarget::Number(60.0)),
            condition("RSI", ComparisonOp::LessThan, ComparisonTarget::Number(60.0)),
        ],
    };
    assert!(evaluator.evaluate_rule_set(&rules, &market).met);
}

#[test]
fn empty_rule_set_is_not_met() {
    let evaluator = stub_evaluator(&[]);
    let market = market_with_closes(&[1.0, 1.1]);
    let result = evaluator.evaluate_rule_set(&RuleSet::default(), &market);
    assert!(!result.met);
    assert!(result.results.is_empty());
}
