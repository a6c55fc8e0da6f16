//! Market data primitives shared by the evaluators and the monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV sample for a symbol and timeframe
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Bar interval a strategy evaluates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A symbol, a timeframe, and its bar history (most recent bar last)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<Bar>,
}

impl MarketData {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    /// Close of the most recent bar
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Close of the bar before the most recent one
    pub fn prev_close(&self) -> Option<f64> {
        if self.bars.len() < 2 {
            return None;
        }
        self.bars.get(self.bars.len() - 2).map(|b| b.close)
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }
}

/// Quote-level information about a symbol, supplied by the terminal bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    /// Smallest price increment (e.g. 0.00001 for 5-digit FX quotes)
    pub point: f64,
    /// Raw spread in price units (ask - bid)
    pub spread: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
}

impl SymbolInfo {
    /// Spread expressed in pips; a pip is ten points on fractional quotes
    pub fn spread_pips(&self) -> f64 {
        if self.point <= 0.0 {
            return 0.0;
        }
        self.spread / self.point / 10.0
    }

    /// Pip size in price units
    pub fn pip_size(&self) -> f64 {
        self.point * 10.0
    }
}

/// Direction of a position or signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Buy => f.write_str("BUY"),
            TradeDirection::Sell => f.write_str("SELL"),
        }
    }
}

/// An open position as reported by the position source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPosition {
    pub ticket: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub direction: TradeDirection,
    pub volume: f64,
}

/// Account-level health metrics fed to the kill switch auto-trigger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetrics {
    pub daily_pnl: f64,
    pub drawdown_pct: f64,
    pub consecutive_losses: u32,
    /// Fraction of recent operations that errored, in [0, 1]
    pub error_rate: f64,
}
