//! Collaborator contracts the engine depends on
//!
//! The terminal bridge, position book, order router, and platform reporter
//! live outside this crate; the engine only sees these traits. Placeholder
//! implementations back the demo binary and the test suite.

use crate::models::market::{Bar, MarketData, OpenPosition, SymbolInfo, Timeframe};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink rejected request: {0}")]
    Rejected(String),
}

/// Supplies bar history. Returns an empty sequence on failure, never errors.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn latest_bars(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Vec<Bar>;

    /// Current quote-level info for a symbol, `None` when the terminal has
    /// nothing for it
    async fn symbol_info(&self, symbol: &str) -> Option<SymbolInfo>;
}

/// Resolves an indicator to its current numeric value, `None` when the
/// indicator is unknown or the history is too short.
pub trait IndicatorSource: Send + Sync {
    fn indicator_value(
        &self,
        market: &MarketData,
        indicator: &str,
        params: &HashMap<String, Value>,
    ) -> Option<f64>;
}

/// Reports currently open positions
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn open_positions(&self) -> Vec<OpenPosition>;
}

/// Accepts close-all / cancel-all commands, returns affected counts.
/// Zero results are a normal outcome.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn close_all_positions(&self) -> Result<usize, SinkError>;
    async fn cancel_all_orders(&self) -> Result<usize, SinkError>;
}

/// Fire-and-forget structured event delivery to the platform.
/// Failures are logged by callers, never retried here.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &str, payload: Value) -> Result<(), SinkError>;
}

/// No-op market data source for wiring tests and the demo binary
pub struct PlaceholderMarketDataSource;

#[async_trait]
impl MarketDataSource for PlaceholderMarketDataSource {
    async fn latest_bars(&self, _symbol: &str, _timeframe: Timeframe, _count: usize) -> Vec<Bar> {
        Vec::new()
    }

    async fn symbol_info(&self, _symbol: &str) -> Option<SymbolInfo> {
        None
    }
}

/// Position source that reports an empty book
pub struct PlaceholderPositionSource;

#[async_trait]
impl PositionSource for PlaceholderPositionSource {
    async fn open_positions(&self) -> Vec<OpenPosition> {
        Vec::new()
    }
}

/// Execution sink that acknowledges every command with zero results
pub struct PlaceholderExecutionSink;

#[async_trait]
impl ExecutionSink for PlaceholderExecutionSink {
    async fn close_all_positions(&self) -> Result<usize, SinkError> {
        Ok(0)
    }

    async fn cancel_all_orders(&self) -> Result<usize, SinkError> {
        Ok(0)
    }
}

/// Notification sink that drops every payload
pub struct PlaceholderNotificationSink;

#[async_trait]
impl NotificationSink for PlaceholderNotificationSink {
    async fn notify(&self, _event: &str, _payload: Value) -> Result<(), SinkError> {
        Ok(())
    }
}
