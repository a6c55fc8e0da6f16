use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sentra::cache::{CachedIndicatorSource, IndicatorCache};
use sentra::config::EngineConfig;
use sentra::events::EventBus;
use sentra::indicators::BuiltinIndicators;
use sentra::logging::init_logging;
use sentra::models::market::{Bar, SymbolInfo, Timeframe};
use sentra::models::strategy::{
    ComparisonOp, ComparisonTarget, Condition, PositionSizePolicy, RuleLogic, RuleSet,
    StopLossSpec, Strategy, StrategyStatus, TakeProfitSpec,
};
use sentra::providers::{
    MarketDataSource, PlaceholderExecutionSink, PlaceholderNotificationSink,
    PlaceholderPositionSource,
};
use sentra::risk::{CorrelationConfig, CorrelationRiskEngine};
use sentra::safety::{EmergencyStop, Severity};
use sentra::StrategyMonitor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Synthetic uptrending feed so the demo strategy produces a signal
struct DemoFeed;

#[async_trait]
impl MarketDataSource for DemoFeed {
    async fn latest_bars(&self, _symbol: &str, _timeframe: Timeframe, count: usize) -> Vec<Bar> {
        let now = Utc::now();
        (0..count)
            .map(|i| {
                let price = 1.0800 + i as f64 * 0.0004;
                Bar::new(
                    now - ChronoDuration::minutes((count - i) as i64),
                    price,
                    price + 0.0003,
                    price - 0.0002,
                    price + 0.0001,
                    1_000.0,
                )
            })
            .collect()
    }

    async fn symbol_info(&self, symbol: &str) -> Option<SymbolInfo> {
        Some(SymbolInfo {
            symbol: symbol.to_string(),
            point: 0.00001,
            spread: 0.00012,
            bid: 1.1196,
            ask: 1.11972,
        })
    }
}

fn demo_strategy() -> Strategy {
    let mut params = HashMap::new();
    params.insert("period".to_string(), serde_json::Value::from(14u64));
    Strategy {
        id: "demo-ema-trend".to_string(),
        name: "Demo EMA trend".to_string(),
        symbols: vec!["EURUSD".to_string()],
        timeframe: Timeframe::M1,
        entry: RuleSet {
            logic: RuleLogic::And,
            conditions: vec![Condition {
                indicator: "price".to_string(),
                params: HashMap::new(),
                operator: ComparisonOp::GreaterThan,
                target: ComparisonTarget::Reference("EMA_20".to_string()),
                enabled: true,
            }],
        },
        exit: RuleSet::default(),
        stop_loss: Some(StopLossSpec::Pips { value: 25.0 }),
        take_profit: Some(TakeProfitSpec::RrRatio { rr_ratio: 1.6 }),
        sizing: PositionSizePolicy::FixedLots { lots: 0.10 },
        filters: Vec::new(),
        status: StrategyStatus::Active,
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let config = EngineConfig::from_env();

    let events = EventBus::default();
    let mut event_rx = events.subscribe();

    let indicator_cache = Arc::new(IndicatorCache::new(
        config.cache_capacity,
        Duration::from_secs(config.cache_ttl_secs),
    ));
    let indicators = Arc::new(CachedIndicatorSource::new(
        Arc::new(BuiltinIndicators),
        indicator_cache,
    ));
    let correlation = Arc::new(CorrelationRiskEngine::new(CorrelationConfig {
        threshold: config.correlation_threshold,
        refresh_window: Duration::from_secs(config.correlation_refresh_secs),
    }));
    let safety = Arc::new(EmergencyStop::new(
        config.safety.clone(),
        Arc::new(PlaceholderExecutionSink),
        Arc::new(PlaceholderNotificationSink),
        events.clone(),
    ));

    let monitor = StrategyMonitor::new(
        config,
        Arc::new(DemoFeed),
        indicators,
        Arc::new(PlaceholderPositionSource),
        Arc::new(PlaceholderNotificationSink),
        safety.clone(),
        correlation,
        events.clone(),
        None,
    );
    safety.set_monitor_controller(Arc::new(monitor.clone()));

    monitor
        .start_monitoring(demo_strategy())
        .await
        .expect("demo strategy should start");

    // Let a few cycles run, then trip the kill switch and watch it unwind
    let printer = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            println!(
                "[{}] {}",
                event.kind(),
                serde_json::to_string(&event).unwrap_or_default()
            );
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    safety
        .activate("demo shutdown", "operator", Severity::Critical)
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("can_trade after kill switch: {}", safety.can_trade());
    printer.abort();
}
