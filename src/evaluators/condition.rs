//! Entry/exit rule evaluation
//!
//! Evaluation is a pure function of the condition, the market data, and the
//! indicator source. Data unavailability (missing bars, unknown indicator)
//! always yields "not met" with a reason; it never errors.

use crate::models::market::MarketData;
use crate::models::strategy::{ComparisonOp, ComparisonTarget, Condition, RuleLogic, RuleSet};
use crate::providers::IndicatorSource;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Tolerance for the equality operator
const EQ_TOLERANCE: f64 = 1e-4;

/// Outcome of one condition, with an audit-friendly reason
#[derive(Debug, Clone)]
pub struct ConditionResult {
    pub met: bool,
    pub reason: String,
    pub indicator_value: Option<f64>,
    pub target_value: Option<f64>,
}

impl ConditionResult {
    fn not_met(reason: impl Into<String>) -> Self {
        Self {
            met: false,
            reason: reason.into(),
            indicator_value: None,
            target_value: None,
        }
    }
}

/// Outcome of a full rule set; every condition is always evaluated so the
/// per-condition results form a complete audit trail
#[derive(Debug, Clone)]
pub struct RuleSetResult {
    pub met: bool,
    pub logic: RuleLogic,
    pub results: Vec<ConditionResult>,
}

pub struct ConditionEvaluator {
    indicators: Arc<dyn IndicatorSource>,
}

impl ConditionEvaluator {
    pub fn new(indicators: Arc<dyn IndicatorSource>) -> Self {
        Self { indicators }
    }

    /// Boolean projection of [`evaluate_condition`](Self::evaluate_condition)
    pub fn evaluate(&self, condition: &Condition, market: &MarketData) -> bool {
        self.evaluate_condition(condition, market).met
    }

    pub fn evaluate_condition(&self, condition: &Condition, market: &MarketData) -> ConditionResult {
        if !condition.enabled {
            return ConditionResult::not_met("condition disabled");
        }

        let indicator_value =
            self.indicators
                .indicator_value(market, &condition.indicator, &condition.params);
        let Some(left) = indicator_value else {
            return ConditionResult::not_met(format!(
                "indicator {} unavailable",
                condition.indicator
            ));
        };

        let Some(right) = self.resolve_target(&condition.target, market) else {
            return ConditionResult::not_met(format!(
                "target {:?} unresolvable",
                condition.target
            ));
        };

        let result = match condition.operator {
            ComparisonOp::GreaterThan => Some(left > right),
            ComparisonOp::LessThan => Some(left < right),
            ComparisonOp::Equal => Some((left - right).abs() < EQ_TOLERANCE),
            ComparisonOp::GreaterEqual => Some(left >= right),
            ComparisonOp::LessEqual => Some(left <= right),
            ComparisonOp::CrossesAbove | ComparisonOp::CrossesBelow => {
                return self.evaluate_cross(condition, market, right)
            }
            // Accepted syntactically, not yet supported
            ComparisonOp::Between | ComparisonOp::Outside => None,
        };

        match result {
            Some(met) => {
                trace!(
                    indicator = %condition.indicator,
                    left,
                    right,
                    op = ?condition.operator,
                    met,
                    "condition evaluated"
                );
                ConditionResult {
                    met,
                    reason: format!(
                        "{} = {:.5} {} {:.5}",
                        condition.indicator,
                        left,
                        op_label(condition.operator),
                        right
                    ),
                    indicator_value: Some(left),
                    target_value: Some(right),
                }
            }
            None => ConditionResult {
                met: false,
                reason: format!("operator {:?} not yet supported", condition.operator),
                indicator_value: Some(left),
                target_value: Some(right),
            },
        }
    }

    /// AND requires every condition met, OR any; both always evaluate the
    /// complete set (no short-circuit)
    pub fn evaluate_rule_set(&self, rules: &RuleSet, market: &MarketData) -> RuleSetResult {
        let results: Vec<ConditionResult> = rules
            .conditions
            .iter()
            .map(|c| self.evaluate_condition(c, market))
            .collect();

        let met = if results.is_empty() {
            false
        } else {
            match rules.logic {
                RuleLogic::And => results.iter().all(|r| r.met),
                RuleLogic::Or => results.iter().any(|r| r.met),
            }
        };

        RuleSetResult {
            met,
            logic: rules.logic,
            results,
        }
    }

    /// Cross comparisons need two bars of history and are only defined when
    /// the left side is literally the price series
    fn evaluate_cross(
        &self,
        condition: &Condition,
        market: &MarketData,
        threshold: f64,
    ) -> ConditionResult {
        if !condition.indicator.eq_ignore_ascii_case("price") {
            return ConditionResult::not_met(format!(
                "cross comparison not supported for indicator {}",
                condition.indicator
            ));
        }
        let (Some(prev), Some(curr)) = (market.prev_close(), market.last_close()) else {
            return ConditionResult::not_met("cross comparison needs at least two bars");
        };

        let met = match condition.operator {
            ComparisonOp::CrossesAbove => prev <= threshold && curr > threshold,
            ComparisonOp::CrossesBelow => prev >= threshold && curr < threshold,
            _ => unreachable!("evaluate_cross called for non-cross operator"),
        };

        ConditionResult {
            met,
            reason: format!(
                "price {:.5} -> {:.5} vs {:.5} ({})",
                prev,
                curr,
                threshold,
                op_label(condition.operator)
            ),
            indicator_value: Some(curr),
            target_value: Some(threshold),
        }
    }

    /// Literal numbers pass through; "price" is the last close; NAME_PERIOD
    /// references resolve as a nested indicator call with that period; other
    /// names are forwarded to the indicator source as-is
    fn resolve_target(&self, target: &ComparisonTarget, market: &MarketData) -> Option<f64> {
        match target {
            ComparisonTarget::Number(n) => Some(*n),
            ComparisonTarget::Reference(name) if name.eq_ignore_ascii_case("price") => {
                market.last_close()
            }
            ComparisonTarget::Reference(name) => {
                let (indicator, params) = split_indicator_reference(name);
                self.indicators.indicator_value(market, indicator, &params)
            }
        }
    }
}

/// "EMA_50" -> ("EMA", {period: 50}); names without a numeric suffix are
/// returned unchanged with empty params
fn split_indicator_reference(name: &str) -> (&str, HashMap<String, Value>) {
    if let Some((prefix, suffix)) = name.rsplit_once('_') {
        if !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
            && !suffix.is_empty()
            && suffix.chars().all(|c| c.is_ascii_digit())
        {
            if let Ok(period) = suffix.parse::<u64>() {
                let mut params = HashMap::new();
                params.insert("period".to_string(), Value::from(period));
                return (prefix, params);
            }
        }
    }
    (name, HashMap::new())
}

fn op_label(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::GreaterThan => ">",
        ComparisonOp::LessThan => "<",
        ComparisonOp::Equal => "=",
        ComparisonOp::GreaterEqual => ">=",
        ComparisonOp::LessEqual => "<=",
        ComparisonOp::CrossesAbove => "crosses_above",
        ComparisonOp::CrossesBelow => "crosses_below",
        ComparisonOp::Between => "between",
        ComparisonOp::Outside => "outside",
    }
}
