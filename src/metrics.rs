//! Prometheus metrics for the monitoring engine

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub signals_generated_total: IntCounter,
    pub signals_suppressed_total: IntCounter,
    pub cycle_errors_total: IntCounter,
    pub killswitch_activations_total: IntCounter,
    pub active_monitors: IntGauge,
    pub cycle_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let signals_generated_total = IntCounter::new(
            "signals_generated_total",
            "Trade signals emitted to the execution layer",
        )?;
        let signals_suppressed_total = IntCounter::new(
            "signals_suppressed_total",
            "Signals dropped by the kill switch",
        )?;
        let cycle_errors_total =
            IntCounter::new("cycle_errors_total", "Monitoring cycle errors")?;
        let killswitch_activations_total = IntCounter::new(
            "killswitch_activations_total",
            "Kill switch activations",
        )?;
        let active_monitors =
            IntGauge::new("active_monitors", "Currently running strategy monitors")?;
        let cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "cycle_duration_seconds",
            "Duration of one monitoring cycle",
        ))?;

        registry.register(Box::new(signals_generated_total.clone()))?;
        registry.register(Box::new(signals_suppressed_total.clone()))?;
        registry.register(Box::new(cycle_errors_total.clone()))?;
        registry.register(Box::new(killswitch_activations_total.clone()))?;
        registry.register(Box::new(active_monitors.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            signals_generated_total,
            signals_suppressed_total,
            cycle_errors_total,
            killswitch_activations_total,
            active_monitors,
            cycle_duration_seconds,
        })
    }
}
