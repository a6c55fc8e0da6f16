//! Emergency stop (kill switch)
//!
//! Process-wide safety state machine. Activation is idempotent and runs a
//! fixed, ordered recovery sequence; a failing step is logged and never
//! aborts the remaining steps, and the trading lock is applied regardless of
//! how the earlier steps fared. `can_trade` is synchronous and must be
//! consulted before any signal is acted upon.

use crate::events::{EngineEvent, EventBus};
use crate::metrics::Metrics;
use crate::models::market::AccountMetrics;
use crate::providers::{ExecutionSink, NotificationSink};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("trading locked until {until}; admin override required")]
    LockActive { until: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Normal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => f.write_str("critical"),
            Severity::High => f.write_str("high"),
            Severity::Normal => f.write_str("normal"),
        }
    }
}

/// Record of the activation that tripped the switch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    pub reason: String,
    pub triggered_by: String,
    pub severity: Severity,
    pub activated_at: DateTime<Utc>,
}

/// Point-in-time capture of the emergency state, kept in memory and pushed
/// to the platform as the final recovery step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencySnapshot {
    pub active: bool,
    pub activation: Option<ActivationRecord>,
    pub locked_until: Option<DateTime<Utc>>,
    pub closed_positions: usize,
    pub canceled_orders: usize,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SafetyConfig {
    pub lock_minutes_critical: i64,
    pub lock_minutes_default: i64,
    /// Auto-trigger: daily PnL below this activates the switch
    pub max_daily_loss: f64,
    /// Auto-trigger: drawdown percentage above this activates the switch
    pub max_drawdown_pct: f64,
    pub max_consecutive_losses: u32,
    pub max_error_rate: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            lock_minutes_critical: 60,
            lock_minutes_default: 30,
            max_daily_loss: -500.0,
            max_drawdown_pct: 10.0,
            max_consecutive_losses: 5,
            max_error_rate: 0.5,
        }
    }
}

/// Implemented by the strategy monitor so the kill switch can stop every
/// session without the two depending on each other directly
#[async_trait]
pub trait MonitorController: Send + Sync {
    async fn stop_all(&self);
}

#[derive(Debug, Default)]
struct EmergencyState {
    active: bool,
    activation: Option<ActivationRecord>,
    locked_until: Option<DateTime<Utc>>,
}

pub struct EmergencyStop {
    config: SafetyConfig,
    state: RwLock<EmergencyState>,
    execution: Arc<dyn ExecutionSink>,
    notifier: Arc<dyn NotificationSink>,
    events: EventBus,
    metrics: Option<Arc<Metrics>>,
    monitors: RwLock<Option<Arc<dyn MonitorController>>>,
    last_snapshot: RwLock<Option<EmergencySnapshot>>,
}

impl EmergencyStop {
    pub fn new(
        config: SafetyConfig,
        execution: Arc<dyn ExecutionSink>,
        notifier: Arc<dyn NotificationSink>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            state: RwLock::new(EmergencyState::default()),
            execution,
            notifier,
            events,
            metrics: None,
            monitors: RwLock::new(None),
            last_snapshot: RwLock::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wire in the monitor registry after construction
    pub fn set_monitor_controller(&self, controller: Arc<dyn MonitorController>) {
        *self.monitors.write().expect("safety lock poisoned") = Some(controller);
    }

    /// True while the switch is inactive and no trading lock is in force.
    /// Synchronous so monitors observe the latest activation outcome.
    pub fn can_trade(&self) -> bool {
        let state = self.state.read().expect("safety lock poisoned");
        if state.active {
            return false;
        }
        match state.locked_until {
            Some(until) => Utc::now() >= until,
            None => true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.read().expect("safety lock poisoned").active
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        self.state.read().expect("safety lock poisoned").locked_until
    }

    pub fn last_snapshot(&self) -> Option<EmergencySnapshot> {
        self.last_snapshot
            .read()
            .expect("safety lock poisoned")
            .clone()
    }

    /// Trip the kill switch and run the recovery sequence. Returns false
    /// when the switch was already active (no-op, no duplicate events).
    pub async fn activate(
        &self,
        reason: impl Into<String>,
        triggered_by: impl Into<String>,
        severity: Severity,
    ) -> bool {
        let record = ActivationRecord {
            reason: reason.into(),
            triggered_by: triggered_by.into(),
            severity,
            activated_at: Utc::now(),
        };

        {
            let mut state = self.state.write().expect("safety lock poisoned");
            if state.active {
                warn!(reason = %record.reason, "kill switch already active, ignoring activation");
                return false;
            }
            state.active = true;
            state.activation = Some(record.clone());
        }

        error!(
            reason = %record.reason,
            triggered_by = %record.triggered_by,
            severity = %record.severity,
            "KILL SWITCH ACTIVATED"
        );
        if let Some(metrics) = &self.metrics {
            metrics.killswitch_activations_total.inc();
        }
        self.events.publish(EngineEvent::KillSwitchActivated {
            reason: record.reason.clone(),
            triggered_by: record.triggered_by.clone(),
            severity: record.severity.to_string(),
        });

        // Step 1: stop every strategy monitor
        let controller = self
            .monitors
            .read()
            .expect("safety lock poisoned")
            .clone();
        match controller {
            Some(controller) => {
                controller.stop_all().await;
                self.events.publish(EngineEvent::KillSwitchMonitorsStopped);
            }
            None => warn!("no monitor controller registered, skipping monitor stop"),
        }

        // Step 2: close all open positions
        let closed = match self.execution.close_all_positions().await {
            Ok(count) => {
                info!(count, "closed open positions");
                self.events
                    .publish(EngineEvent::KillSwitchPositionsClosed { count });
                count
            }
            Err(e) => {
                error!(error = %e, "failed to close positions");
                self.events.publish(EngineEvent::KillSwitchError {
                    step: "close_positions".to_string(),
                    error: e.to_string(),
                });
                0
            }
        };

        // Step 3: cancel all pending orders
        let canceled = match self.execution.cancel_all_orders().await {
            Ok(count) => {
                info!(count, "canceled pending orders");
                self.events
                    .publish(EngineEvent::KillSwitchOrdersCanceled { count });
                count
            }
            Err(e) => {
                error!(error = %e, "failed to cancel orders");
                self.events.publish(EngineEvent::KillSwitchError {
                    step: "cancel_orders".to_string(),
                    error: e.to_string(),
                });
                0
            }
        };

        // Step 4: lock trading. Runs regardless of how steps 1-3 fared.
        let lock_minutes = if severity == Severity::Critical {
            self.config.lock_minutes_critical
        } else {
            self.config.lock_minutes_default
        };
        let locked_until = Utc::now() + ChronoDuration::minutes(lock_minutes);
        {
            let mut state = self.state.write().expect("safety lock poisoned");
            state.locked_until = Some(locked_until);
        }
        info!(%locked_until, lock_minutes, "trading locked");

        // Step 5: notify the platform; a dead sink is logged, not retried
        if let Err(e) = self
            .notifier
            .notify(
                "killswitch:activated",
                json!({
                    "reason": record.reason,
                    "triggeredBy": record.triggered_by,
                    "severity": record.severity.to_string(),
                    "lockedUntil": locked_until,
                }),
            )
            .await
        {
            warn!(error = %e, "platform notification failed");
        }

        // Step 6: snapshot the emergency state
        let snapshot = EmergencySnapshot {
            active: true,
            activation: Some(record),
            locked_until: Some(locked_until),
            closed_positions: closed,
            canceled_orders: canceled,
            taken_at: Utc::now(),
        };
        if let Err(e) = self
            .notifier
            .notify(
                "killswitch:snapshot",
                serde_json::to_value(&snapshot).unwrap_or_default(),
            )
            .await
        {
            warn!(error = %e, "snapshot delivery failed");
        }
        *self.last_snapshot.write().expect("safety lock poisoned") = Some(snapshot);

        self.events.publish(EngineEvent::KillSwitchCompleted {
            closed_positions: closed,
            canceled_orders: canceled,
            locked_until,
        });
        true
    }

    /// Clear the switch. Fails while the trading lock is still in force
    /// unless an admin override is supplied.
    pub fn deactivate(&self, admin_override: bool) -> Result<(), SafetyError> {
        let mut state = self.state.write().expect("safety lock poisoned");
        if let Some(until) = state.locked_until {
            if Utc::now() < until && !admin_override {
                warn!(%until, "deactivation rejected, trading lock still in force");
                return Err(SafetyError::LockActive { until });
            }
        }
        state.active = false;
        state.activation = None;
        state.locked_until = None;
        drop(state);

        info!(admin_override, "kill switch deactivated");
        self.events.publish(EngineEvent::KillSwitchDeactivated);
        Ok(())
    }

    /// Evaluate every auto-trigger threshold against the supplied metrics.
    /// All four are checked unconditionally; the first activation wins and
    /// later breaches in the same pass become no-ops. Returns the rules that
    /// fired for auditing.
    pub async fn check_auto_trigger(&self, metrics: &AccountMetrics) -> Vec<&'static str> {
        let mut fired = Vec::new();

        if metrics.daily_pnl < self.config.max_daily_loss {
            fired.push("daily_loss");
            self.activate(
                format!("Daily loss limit breached: {:.2}", metrics.daily_pnl),
                "auto_trigger",
                Severity::Critical,
            )
            .await;
        }
        if metrics.drawdown_pct > self.config.max_drawdown_pct {
            fired.push("drawdown");
            self.activate(
                format!("Drawdown limit breached: {:.2}%", metrics.drawdown_pct),
                "auto_trigger",
                Severity::Critical,
            )
            .await;
        }
        if metrics.consecutive_losses >= self.config.max_consecutive_losses {
            fired.push("consecutive_losses");
            self.activate(
                format!("{} consecutive losses", metrics.consecutive_losses),
                "auto_trigger",
                Severity::High,
            )
            .await;
        }
        if metrics.error_rate > self.config.max_error_rate {
            fired.push("error_rate");
            self.activate(
                format!("Error rate {:.2} above limit", metrics.error_rate),
                "auto_trigger",
                Severity::High,
            )
            .await;
        }

        fired
    }
}
