//! Per-strategy monitoring session records

use crate::models::strategy::Strategy;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Lifecycle of one monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Monitoring,
    Stopped,
    Faulted,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Monitoring,
            1 => SessionState::Stopped,
            _ => SessionState::Faulted,
        }
    }
}

/// Counters shared between the session map and its loop task
#[derive(Debug)]
pub struct SessionStats {
    state: AtomicU8,
    last_check: Mutex<Option<DateTime<Utc>>>,
    signals_generated: AtomicU64,
    consecutive_errors: AtomicU32,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Monitoring as u8),
            last_check: Mutex::new(None),
            signals_generated: AtomicU64::new(0),
            consecutive_errors: AtomicU32::new(0),
        }
    }
}

impl SessionStats {
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn touch(&self) {
        *self.last_check.lock().expect("session lock poisoned") = Some(Utc::now());
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        *self.last_check.lock().expect("session lock poisoned")
    }

    pub fn record_signal(&self) {
        self.signals_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signals_generated(&self) -> u64 {
        self.signals_generated.load(Ordering::Relaxed)
    }

    /// Returns the new consecutive error count
    pub fn record_error(&self) -> u32 {
        self.consecutive_errors.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn reset_errors(&self) {
        self.consecutive_errors.store(0, Ordering::Release);
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::Acquire)
    }
}

/// A running monitor: strategy snapshot, loop task handle, shared counters.
/// Created by `start_monitoring`, destroyed by stop or fault.
pub struct MonitorSession {
    pub strategy: Arc<Strategy>,
    pub active: Arc<AtomicBool>,
    pub handle: JoinHandle<()>,
    pub stats: Arc<SessionStats>,
}

impl MonitorSession {
    /// Flag the loop to stop and cancel the pending timer; idempotent
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
        self.handle.abort();
    }
}
