//! Typed publish/subscribe event stream
//!
//! Downstream wiring (the execution layer, the platform reporter) subscribes
//! by event kind; the kind strings are stable.

use crate::models::signal::Signal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum EngineEvent {
    #[serde(rename = "signal:generated")]
    #[serde(rename_all = "camelCase")]
    SignalGenerated { strategy_id: String, signal: Signal },

    #[serde(rename = "monitor:stopped")]
    #[serde(rename_all = "camelCase")]
    MonitorStopped { strategy_id: String },

    #[serde(rename = "monitor:error")]
    #[serde(rename_all = "camelCase")]
    MonitorError { strategy_id: String, error: String },

    #[serde(rename = "killswitch:activated")]
    #[serde(rename_all = "camelCase")]
    KillSwitchActivated {
        reason: String,
        triggered_by: String,
        severity: String,
    },

    #[serde(rename = "killswitch:monitors_stopped")]
    KillSwitchMonitorsStopped,

    #[serde(rename = "killswitch:positions_closed")]
    #[serde(rename_all = "camelCase")]
    KillSwitchPositionsClosed { count: usize },

    #[serde(rename = "killswitch:orders_canceled")]
    #[serde(rename_all = "camelCase")]
    KillSwitchOrdersCanceled { count: usize },

    #[serde(rename = "killswitch:completed")]
    #[serde(rename_all = "camelCase")]
    KillSwitchCompleted {
        closed_positions: usize,
        canceled_orders: usize,
        locked_until: DateTime<Utc>,
    },

    #[serde(rename = "killswitch:deactivated")]
    KillSwitchDeactivated,

    #[serde(rename = "killswitch:error")]
    #[serde(rename_all = "camelCase")]
    KillSwitchError { step: String, error: String },
}

impl EngineEvent {
    /// Stable event name for downstream wiring
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::SignalGenerated { .. } => "signal:generated",
            EngineEvent::MonitorStopped { .. } => "monitor:stopped",
            EngineEvent::MonitorError { .. } => "monitor:error",
            EngineEvent::KillSwitchActivated { .. } => "killswitch:activated",
            EngineEvent::KillSwitchMonitorsStopped => "killswitch:monitors_stopped",
            EngineEvent::KillSwitchPositionsClosed { .. } => "killswitch:positions_closed",
            EngineEvent::KillSwitchOrdersCanceled { .. } => "killswitch:orders_canceled",
            EngineEvent::KillSwitchCompleted { .. } => "killswitch:completed",
            EngineEvent::KillSwitchDeactivated => "killswitch:deactivated",
            EngineEvent::KillSwitchError { .. } => "killswitch:error",
        }
    }
}

/// Broadcast bus; publishing never blocks and tolerates having no subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        debug!(event = event.kind(), "publishing engine event");
        // Err means no live subscribers, which is fine
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
