//! Strategy monitor: one self-rescheduling polling loop per active strategy
//!
//! Each loop iteration fetches bars, gates through the filters, evaluates the
//! entry rules, consults the kill switch and the correlation engine, and
//! emits a signal event. The next iteration is scheduled only after the
//! current one completes, so a slow cycle naturally delays the next and
//! iterations of one strategy never overlap.

pub mod session;

use crate::config::EngineConfig;
use crate::evaluators::condition::ConditionEvaluator;
use crate::evaluators::filter::FilterEvaluator;
use crate::events::{EngineEvent, EventBus};
use crate::metrics::Metrics;
use crate::models::market::{MarketData, SymbolInfo, Timeframe, TradeDirection};
use crate::models::signal::Signal;
use crate::models::strategy::{StopLossSpec, Strategy, StrategyStatus, TakeProfitSpec};
use crate::providers::{IndicatorSource, MarketDataSource, NotificationSink, PositionSource};
use crate::risk::sizing::{AccountSnapshot, PositionSizer};
use crate::risk::CorrelationRiskEngine;
use crate::safety::{EmergencyStop, MonitorController};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::FutureExt;
use serde_json::json;
use session::{MonitorSession, SessionState, SessionStats};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Fallback SL/TP distances when the strategy specifies none
const DEFAULT_SL_PIPS: f64 = 25.0;
const DEFAULT_TP_PIPS: f64 = 40.0;
const MIN_SL_PIPS: f64 = 5.0;
const MIN_TP_PIPS: f64 = 10.0;
/// Trend reference used to pick the trade side once entry rules are met
const TREND_EMA_PERIOD: u64 = 50;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("strategy {0} is already being monitored")]
    AlreadyActive(String),
    #[error("strategy {0} has no symbols")]
    NoSymbols(String),
    #[error("strategy {0} is paused")]
    Paused(String),
}

#[derive(Debug, Error)]
enum CycleError {
    #[error("no primary symbol")]
    MissingSymbol,
    #[error("cycle panicked: {0}")]
    Panicked(String),
}

/// How one iteration ended; drives logging only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    NoData,
    FilteredOut,
    NoSignal,
    Suppressed,
    SignalEmitted,
}

struct MonitorInner {
    config: EngineConfig,
    market_data: Arc<dyn MarketDataSource>,
    indicators: Arc<dyn IndicatorSource>,
    positions: Arc<dyn PositionSource>,
    notifier: Arc<dyn NotificationSink>,
    safety: Arc<EmergencyStop>,
    correlation: Arc<CorrelationRiskEngine>,
    events: EventBus,
    metrics: Option<Arc<Metrics>>,
    evaluator: ConditionEvaluator,
    account: std::sync::RwLock<AccountSnapshot>,
    sessions: RwLock<HashMap<String, MonitorSession>>,
}

#[derive(Clone)]
pub struct StrategyMonitor {
    inner: Arc<MonitorInner>,
}

impl StrategyMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        market_data: Arc<dyn MarketDataSource>,
        indicators: Arc<dyn IndicatorSource>,
        positions: Arc<dyn PositionSource>,
        notifier: Arc<dyn NotificationSink>,
        safety: Arc<EmergencyStop>,
        correlation: Arc<CorrelationRiskEngine>,
        events: EventBus,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let evaluator = ConditionEvaluator::new(indicators.clone());
        Self {
            inner: Arc::new(MonitorInner {
                config,
                market_data,
                indicators,
                positions,
                notifier,
                safety,
                correlation,
                events,
                metrics,
                evaluator,
                account: std::sync::RwLock::new(AccountSnapshot::default()),
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Refresh the account figures used for risk-percentage sizing
    pub fn update_account(&self, account: AccountSnapshot) {
        *self.inner.account.write().expect("account lock poisoned") = account;
    }

    /// Create a session for the strategy and start its polling loop.
    /// Fails when a session already exists for the strategy id.
    pub async fn start_monitoring(&self, strategy: Strategy) -> Result<(), MonitorError> {
        if strategy.symbols.is_empty() {
            return Err(MonitorError::NoSymbols(strategy.id.clone()));
        }
        if strategy.status == StrategyStatus::Paused {
            return Err(MonitorError::Paused(strategy.id.clone()));
        }

        let mut sessions = self.inner.sessions.write().await;
        if sessions.contains_key(&strategy.id) {
            return Err(MonitorError::AlreadyActive(strategy.id.clone()));
        }

        let strategy = Arc::new(strategy);
        let stats = Arc::new(SessionStats::default());
        let active = Arc::new(AtomicBool::new(true));

        let inner = self.inner.clone();
        let loop_strategy = strategy.clone();
        let loop_stats = stats.clone();
        let loop_active = active.clone();
        let handle = tokio::spawn(async move {
            run_monitor_loop(inner, loop_strategy, loop_stats, loop_active).await;
        });

        info!(
            strategy_id = %strategy.id,
            strategy_name = %strategy.name,
            symbol = strategy.primary_symbol().unwrap_or("?"),
            timeframe = %strategy.timeframe,
            "monitoring started"
        );
        if let Some(metrics) = &self.inner.metrics {
            metrics.active_monitors.inc();
        }

        sessions.insert(
            strategy.id.clone(),
            MonitorSession {
                strategy,
                active,
                handle,
                stats,
            },
        );
        Ok(())
    }

    /// Cancel the pending timer and remove the session. Returns false when no
    /// session exists for the id; stopping twice is a harmless no-op.
    pub async fn stop_monitoring(&self, strategy_id: &str) -> bool {
        let removed = {
            let mut sessions = self.inner.sessions.write().await;
            sessions.remove(strategy_id)
        };
        match removed {
            Some(session) => {
                session.cancel();
                session.stats.set_state(SessionState::Stopped);
                if let Some(metrics) = &self.inner.metrics {
                    metrics.active_monitors.dec();
                }
                info!(strategy_id, "monitoring stopped");
                self.inner.events.publish(EngineEvent::MonitorStopped {
                    strategy_id: strategy_id.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Stop every active session
    pub async fn stop_all_monitors(&self) {
        let ids: Vec<String> = {
            let sessions = self.inner.sessions.read().await;
            sessions.keys().cloned().collect()
        };
        for id in ids {
            self.stop_monitoring(&id).await;
        }
    }

    pub async fn is_monitoring(&self, strategy_id: &str) -> bool {
        self.inner.sessions.read().await.contains_key(strategy_id)
    }

    pub async fn active_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn session_stats(&self, strategy_id: &str) -> Option<Arc<SessionStats>> {
        self.inner
            .sessions
            .read()
            .await
            .get(strategy_id)
            .map(|s| s.stats.clone())
    }
}

#[async_trait]
impl MonitorController for StrategyMonitor {
    async fn stop_all(&self) {
        self.stop_all_monitors().await;
    }
}

/// Delay to the next iteration, keyed by timeframe
pub fn poll_delay(timeframe: Timeframe) -> Duration {
    match timeframe {
        Timeframe::M1 => Duration::from_secs(1),
        Timeframe::M5 => Duration::from_secs(5),
        Timeframe::M15 => Duration::from_secs(15),
        Timeframe::M30 => Duration::from_secs(30),
        Timeframe::H1 => Duration::from_secs(60),
        Timeframe::H4 => Duration::from_secs(120),
        Timeframe::D1 => Duration::from_secs(300),
    }
}

async fn run_monitor_loop(
    inner: Arc<MonitorInner>,
    strategy: Arc<Strategy>,
    stats: Arc<SessionStats>,
    active: Arc<AtomicBool>,
) {
    let delay = poll_delay(strategy.timeframe);
    let max_errors = inner.config.max_consecutive_errors;

    loop {
        if !active.load(Ordering::Acquire) {
            break;
        }

        stats.touch();
        let timer = inner
            .metrics
            .as_ref()
            .map(|m| m.cycle_duration_seconds.start_timer());

        // Panics inside a cycle count as iteration errors, not task death
        let cycle = AssertUnwindSafe(run_cycle(&inner, &strategy, &stats))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(CycleError::Panicked(msg))
            });
        drop(timer);

        match cycle {
            Ok(outcome) => {
                stats.reset_errors();
                debug!(strategy_id = %strategy.id, outcome = ?outcome, "cycle complete");
            }
            Err(e) => {
                let errors = stats.record_error();
                if let Some(metrics) = &inner.metrics {
                    metrics.cycle_errors_total.inc();
                }
                error!(
                    strategy_id = %strategy.id,
                    error = %e,
                    consecutive_errors = errors,
                    "monitoring cycle failed"
                );
                inner.events.publish(EngineEvent::MonitorError {
                    strategy_id: strategy.id.clone(),
                    error: e.to_string(),
                });

                if errors > max_errors {
                    fault_session(&inner, &strategy, &stats).await;
                    return;
                }
            }
        }

        tokio::time::sleep(delay).await;
    }
}

/// Error ceiling breached: implicit stop plus a fault event. The session is
/// removed and no further timer is scheduled.
async fn fault_session(inner: &Arc<MonitorInner>, strategy: &Strategy, stats: &SessionStats) {
    error!(
        strategy_id = %strategy.id,
        "consecutive error ceiling exceeded, stopping monitor"
    );
    stats.set_state(SessionState::Faulted);
    {
        let mut sessions = inner.sessions.write().await;
        sessions.remove(&strategy.id);
    }
    if let Some(metrics) = &inner.metrics {
        metrics.active_monitors.dec();
    }
    inner.events.publish(EngineEvent::MonitorError {
        strategy_id: strategy.id.clone(),
        error: "consecutive error ceiling exceeded".to_string(),
    });
    inner.events.publish(EngineEvent::MonitorStopped {
        strategy_id: strategy.id.clone(),
    });
    if let Err(e) = inner
        .notifier
        .notify(
            "monitor:faulted",
            json!({ "strategyId": strategy.id, "error": "consecutive error ceiling exceeded" }),
        )
        .await
    {
        warn!(error = %e, "fault notification failed");
    }
}

async fn run_cycle(
    inner: &Arc<MonitorInner>,
    strategy: &Strategy,
    stats: &SessionStats,
) -> Result<CycleOutcome, CycleError> {
    let symbol = strategy
        .primary_symbol()
        .ok_or(CycleError::MissingSymbol)?
        .to_string();

    let bars = inner
        .market_data
        .latest_bars(&symbol, strategy.timeframe, inner.config.bars_per_cycle)
        .await;
    if bars.is_empty() {
        debug!(strategy_id = %strategy.id, symbol = %symbol, "no bars returned");
        return Ok(CycleOutcome::NoData);
    }
    let market = MarketData::new(symbol.clone(), strategy.timeframe, bars);

    let symbol_info = inner
        .market_data
        .symbol_info(&symbol)
        .await
        .unwrap_or(SymbolInfo {
            symbol: symbol.clone(),
            point: 0.0,
            spread: 0.0,
            bid: 0.0,
            ask: 0.0,
        });
    let volatility = inner
        .indicators
        .indicator_value(&market, "ATR", &HashMap::new());

    let filters = FilterEvaluator::evaluate_filters(
        &strategy.filters,
        &symbol_info,
        volatility,
        Utc::now(),
    );
    if !filters.passed {
        return Ok(CycleOutcome::FilteredOut);
    }

    let entry = inner.evaluator.evaluate_rule_set(&strategy.entry, &market);
    if !entry.met {
        notify_exit_conditions(inner, strategy, &market).await;
        return Ok(CycleOutcome::NoSignal);
    }

    let Some(entry_price) = market.last_close() else {
        return Ok(CycleOutcome::NoData);
    };

    // Side selection follows the trend reference: long above EMA(50)
    let mut trend_params = HashMap::new();
    trend_params.insert("period".to_string(), serde_json::Value::from(TREND_EMA_PERIOD));
    let direction = match inner.indicators.indicator_value(&market, "EMA", &trend_params) {
        Some(ema) if entry_price < ema => TradeDirection::Sell,
        _ => TradeDirection::Buy,
    };

    let pip = symbol_info.pip_size();
    let atr_pips = match (volatility, pip > 0.0) {
        (Some(atr), true) => Some(atr / pip),
        _ => None,
    };
    let sl_pips = stop_loss_pips(strategy.stop_loss.as_ref(), atr_pips);
    let tp_pips = take_profit_pips(strategy.take_profit.as_ref(), sl_pips);
    let (stop_loss, take_profit) = if pip > 0.0 {
        match direction {
            TradeDirection::Buy => (
                Some(entry_price - sl_pips * pip),
                Some(entry_price + tp_pips * pip),
            ),
            TradeDirection::Sell => (
                Some(entry_price + sl_pips * pip),
                Some(entry_price - tp_pips * pip),
            ),
        }
    } else {
        (None, None)
    };

    let account = *inner.account.read().expect("account lock poisoned");
    let proposed_volume = PositionSizer::size(&strategy.sizing, &account, sl_pips);

    // Safety gate: the kill switch is consulted synchronously before any
    // signal leaves the engine
    if !inner.safety.can_trade() {
        warn!(
            strategy_id = %strategy.id,
            symbol = %symbol,
            "signal suppressed, kill switch engaged or trading locked"
        );
        if let Some(metrics) = &inner.metrics {
            metrics.signals_suppressed_total.inc();
        }
        return Ok(CycleOutcome::Suppressed);
    }

    let positions = inner.positions.open_positions().await;
    let assessment = inner
        .correlation
        .assess(&symbol, proposed_volume, &positions);

    let mut signal = Signal::new(
        strategy.id.clone(),
        symbol.clone(),
        direction,
        strategy.timeframe,
        entry_price,
    )
    .with_levels(stop_loss, take_profit)
    .with_volume(assessment.adjusted_volume);
    for result in entry.results.iter().filter(|r| r.met) {
        signal = signal.with_reason(result.reason.clone());
    }
    if assessment.adjusted_volume < proposed_volume {
        signal = signal.with_reason(format!(
            "size reduced {:.2} -> {:.2}: {}",
            proposed_volume, assessment.adjusted_volume, assessment.reason
        ));
    }

    info!(
        strategy_id = %strategy.id,
        symbol = %symbol,
        direction = %direction,
        volume = signal.volume,
        entry_price,
        "signal generated"
    );
    stats.record_signal();
    if let Some(metrics) = &inner.metrics {
        metrics.signals_generated_total.inc();
    }

    if let Err(e) = inner
        .notifier
        .notify(
            "signal:generated",
            serde_json::to_value(&signal).unwrap_or_default(),
        )
        .await
    {
        warn!(error = %e, "signal notification failed");
    }
    inner.events.publish(EngineEvent::SignalGenerated {
        strategy_id: strategy.id.clone(),
        signal,
    });

    Ok(CycleOutcome::SignalEmitted)
}

/// With no entry signal this cycle, check whether exit rules fire for the
/// strategy's open positions and alert the platform if so
async fn notify_exit_conditions(inner: &Arc<MonitorInner>, strategy: &Strategy, market: &MarketData) {
    if strategy.exit.conditions.is_empty() {
        return;
    }
    let exit = inner.evaluator.evaluate_rule_set(&strategy.exit, market);
    if !exit.met {
        return;
    }
    let open: Vec<u64> = inner
        .positions
        .open_positions()
        .await
        .iter()
        .filter(|p| p.symbol.eq_ignore_ascii_case(&market.symbol))
        .map(|p| p.ticket)
        .collect();
    if open.is_empty() {
        return;
    }

    info!(
        strategy_id = %strategy.id,
        symbol = %market.symbol,
        tickets = ?open,
        "exit conditions met for open positions"
    );
    let reasons: Vec<&str> = exit
        .results
        .iter()
        .filter(|r| r.met)
        .map(|r| r.reason.as_str())
        .collect();
    if let Err(e) = inner
        .notifier
        .notify(
            "exit:conditions_met",
            json!({
                "strategyId": strategy.id,
                "symbol": market.symbol,
                "tickets": open,
                "reasons": reasons,
            }),
        )
        .await
    {
        warn!(error = %e, "exit notification failed");
    }
}

fn stop_loss_pips(spec: Option<&StopLossSpec>, atr_pips: Option<f64>) -> f64 {
    match spec {
        Some(StopLossSpec::Pips { value }) => *value,
        Some(StopLossSpec::Atr { atr_multiplier }) => match atr_pips {
            Some(atr) => (atr_multiplier * atr).max(MIN_SL_PIPS),
            None => DEFAULT_SL_PIPS,
        },
        None => DEFAULT_SL_PIPS,
    }
}

fn take_profit_pips(spec: Option<&TakeProfitSpec>, sl_pips: f64) -> f64 {
    match spec {
        Some(TakeProfitSpec::Pips { value }) => *value,
        Some(TakeProfitSpec::RrRatio { rr_ratio }) => (rr_ratio * sl_pips).max(MIN_TP_PIPS),
        None => DEFAULT_TP_PIPS,
    }
}
