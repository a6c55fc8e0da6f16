//! sentra — strategy monitoring, rule-evaluation, and risk-safety engine
//!
//! The decision core of an automated trading executor: per-strategy polling
//! monitors, condition and filter evaluation, correlation-aware position
//! sizing, and an always-available kill switch. The terminal bridge, the
//! position book, and the platform reporter are external collaborators
//! behind the traits in [`providers`].

pub mod cache;
pub mod concurrency;
pub mod config;
pub mod evaluators;
pub mod events;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod providers;
pub mod risk;
pub mod safety;

pub use config::EngineConfig;
pub use events::{EngineEvent, EventBus};
pub use monitor::{MonitorError, StrategyMonitor};
pub use safety::{EmergencyStop, SafetyConfig, Severity};
