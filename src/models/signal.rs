//! Generated trade signals pending execution

use crate::models::market::{Timeframe, TradeDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trade recommendation produced by one monitoring cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub direction: TradeDirection,
    pub timeframe: Timeframe,
    pub entry_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    pub volume: f64,
    pub reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        direction: TradeDirection,
        timeframe: Timeframe,
        entry_price: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            direction,
            timeframe,
            entry_price,
            stop_loss: None,
            take_profit: None,
            volume: 0.0,
            reasons: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_levels(mut self, stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}
