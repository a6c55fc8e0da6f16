//! Strategy data model consumed by the evaluators and the monitor
//!
//! Strategies are owned by the platform and arrive as JSON; the engine holds
//! an immutable snapshot per monitoring session and never persists it.

use crate::models::market::Timeframe;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Immutable strategy snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub entry: RuleSet,
    #[serde(default)]
    pub exit: RuleSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<StopLossSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<TakeProfitSpec>,
    #[serde(default)]
    pub sizing: PositionSizePolicy,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub status: StrategyStatus,
}

impl Strategy {
    /// The symbol the monitoring loop polls; multi-symbol strategies fan the
    /// rest out through the parallel evaluator
    pub fn primary_symbol(&self) -> Option<&str> {
        self.symbols.first().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    #[default]
    Active,
    Paused,
}

/// A set of conditions combined with AND/OR logic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub logic: RuleLogic,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLogic {
    #[default]
    And,
    Or,
}

/// A single entry/exit rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Indicator identifier, e.g. "RSI", "EMA", "price"
    pub indicator: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    pub operator: ComparisonOp,
    /// Literal number, the keyword "price", or a reference like "EMA_50"
    pub target: ComparisonTarget,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = "crosses_above")]
    CrossesAbove,
    #[serde(rename = "crosses_below")]
    CrossesBelow,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "outside")]
    Outside,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComparisonTarget {
    Number(f64),
    /// "price" or an indicator reference of the form NAME_PERIOD
    Reference(String),
}

/// Gating rule unrelated to entry/exit logic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: FilterKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterKind {
    /// HH:MM range in UTC; start > end spans midnight
    Time { start: String, end: String },
    #[serde(rename_all = "camelCase")]
    Session { allowed_sessions: Vec<TradingSession> },
    #[serde(rename_all = "camelCase")]
    Spread { max_pips: f64 },
    Volatility {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Days use 0 = Sunday .. 6 = Saturday
    #[serde(rename_all = "camelCase")]
    DayOfWeek { allowed_days: Vec<u32> },
    News,
    /// Unrecognized filter types pass by default
    #[serde(other)]
    Unknown,
}

impl FilterKind {
    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::Time { .. } => "time",
            FilterKind::Session { .. } => "session",
            FilterKind::Spread { .. } => "spread",
            FilterKind::Volatility { .. } => "volatility",
            FilterKind::DayOfWeek { .. } => "dayOfWeek",
            FilterKind::News => "news",
            FilterKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradingSession {
    Asian,
    London,
    NewYork,
}

/// Stop-loss placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StopLossSpec {
    Pips { value: f64 },
    #[serde(rename_all = "camelCase")]
    Atr { atr_multiplier: f64 },
}

/// Take-profit placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TakeProfitSpec {
    Pips { value: f64 },
    #[serde(rename_all = "camelCase")]
    RrRatio { rr_ratio: f64 },
}

/// How the monitor sizes a signal before risk adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PositionSizePolicy {
    FixedLots { lots: f64 },
    #[serde(rename_all = "camelCase")]
    RiskPercent {
        risk_pct: f64,
        #[serde(default = "default_min_lot")]
        min_lot: f64,
        #[serde(default = "default_max_lot")]
        max_lot: f64,
    },
}

fn default_min_lot() -> f64 {
    0.01
}

fn default_max_lot() -> f64 {
    1.0
}

impl Default for PositionSizePolicy {
    fn default() -> Self {
        PositionSizePolicy::FixedLots { lots: 0.01 }
    }
}
