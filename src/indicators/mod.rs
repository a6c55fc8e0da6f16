//! Built-in indicator source
//!
//! Computes the handful of indicators the rule model references directly from
//! bar history. A terminal-backed implementation can replace this behind the
//! [`IndicatorSource`] trait without touching the evaluators.

pub mod math;

use crate::models::market::MarketData;
use crate::providers::IndicatorSource;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_EMA_PERIOD: usize = 50;
const DEFAULT_SMA_PERIOD: usize = 20;
const DEFAULT_RSI_PERIOD: usize = 14;
const DEFAULT_ATR_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

pub struct BuiltinIndicators;

impl BuiltinIndicators {
    fn period_param(params: &HashMap<String, Value>, default: usize) -> usize {
        params
            .get("period")
            .and_then(Value::as_u64)
            .map(|p| p as usize)
            .unwrap_or(default)
    }

    fn closes(market: &MarketData) -> Vec<f64> {
        market.bars.iter().map(|b| b.close).collect()
    }

    fn rsi(closes: &[f64], period: usize) -> Option<f64> {
        if period == 0 || closes.len() < period + 1 {
            return None;
        }
        let mut gains = 0.0;
        let mut losses = 0.0;
        for window in closes.windows(2).rev().take(period) {
            let change = window[1] - window[0];
            if change > 0.0 {
                gains += change;
            } else {
                losses += change.abs();
            }
        }
        let avg_gain = gains / period as f64;
        let avg_loss = losses / period as f64;
        if avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - (100.0 / (1.0 + rs)))
    }

    fn atr(market: &MarketData, period: usize) -> Option<f64> {
        if period == 0 || market.bars.len() < period + 1 {
            return None;
        }
        let tr: Vec<f64> = market
            .bars
            .windows(2)
            .map(|w| math::true_range(w[1].high, w[1].low, w[0].close))
            .collect();
        math::sma(&tr, period)
    }

    fn macd_line(closes: &[f64]) -> Option<f64> {
        let fast = math::ema(closes, MACD_FAST)?;
        let slow = math::ema(closes, MACD_SLOW)?;
        Some(fast - slow)
    }

    /// Signal line: EMA of the MACD series over the trailing window
    fn macd_signal(closes: &[f64]) -> Option<f64> {
        if closes.len() < MACD_SLOW + MACD_SIGNAL {
            return None;
        }
        let mut series = Vec::with_capacity(MACD_SIGNAL);
        for end in (closes.len() - MACD_SIGNAL + 1)..=closes.len() {
            series.push(Self::macd_line(&closes[..end])?);
        }
        math::ema(&series, MACD_SIGNAL)
    }
}

impl IndicatorSource for BuiltinIndicators {
    fn indicator_value(
        &self,
        market: &MarketData,
        indicator: &str,
        params: &HashMap<String, Value>,
    ) -> Option<f64> {
        let closes = Self::closes(market);
        match indicator.to_ascii_uppercase().as_str() {
            "PRICE" => closes.last().copied(),
            "EMA" => math::ema(&closes, Self::period_param(params, DEFAULT_EMA_PERIOD)),
            "SMA" => math::sma(&closes, Self::period_param(params, DEFAULT_SMA_PERIOD)),
            "RSI" => Self::rsi(&closes, Self::period_param(params, DEFAULT_RSI_PERIOD)),
            "ATR" => Self::atr(market, Self::period_param(params, DEFAULT_ATR_PERIOD)),
            "MACD" => Self::macd_line(&closes),
            "MACD_SIGNAL" => Self::macd_signal(&closes),
            other => {
                debug!(indicator = other, symbol = %market.symbol, "unknown indicator requested");
                None
            }
        }
    }
}
