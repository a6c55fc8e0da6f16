//! Engine configuration from the environment

use crate::safety::SafetyConfig;
use std::str::FromStr;

/// Deployment environment, used to pick the logging format
pub fn get_environment() -> String {
    std::env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bars requested from the data source each cycle
    pub bars_per_cycle: usize,
    /// Parallel evaluator concurrency ceiling (clamped to 1..=50)
    pub concurrency: usize,
    pub item_timeout_secs: u64,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub correlation_threshold: f64,
    pub correlation_refresh_secs: u64,
    /// Consecutive cycle errors before a monitor faults out
    pub max_consecutive_errors: u32,
    pub safety: SafetyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bars_per_cycle: 100,
            concurrency: 10,
            item_timeout_secs: 30,
            cache_capacity: 500,
            cache_ttl_secs: 300,
            correlation_threshold: 0.7,
            correlation_refresh_secs: 3600,
            max_consecutive_errors: 10,
            safety: SafetyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment, falling back to defaults.
    /// Reads a `.env` file when one is present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        let default_safety = SafetyConfig::default();

        Self {
            bars_per_cycle: env_or("SENTRA_BARS_PER_CYCLE", defaults.bars_per_cycle),
            concurrency: env_or("SENTRA_CONCURRENCY", defaults.concurrency),
            item_timeout_secs: env_or("SENTRA_ITEM_TIMEOUT_SECS", defaults.item_timeout_secs),
            cache_capacity: env_or("SENTRA_CACHE_CAPACITY", defaults.cache_capacity),
            cache_ttl_secs: env_or("SENTRA_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            correlation_threshold: env_or(
                "SENTRA_CORRELATION_THRESHOLD",
                defaults.correlation_threshold,
            ),
            correlation_refresh_secs: env_or(
                "SENTRA_CORRELATION_REFRESH_SECS",
                defaults.correlation_refresh_secs,
            ),
            max_consecutive_errors: env_or(
                "SENTRA_MAX_CONSECUTIVE_ERRORS",
                defaults.max_consecutive_errors,
            ),
            safety: SafetyConfig {
                lock_minutes_critical: env_or(
                    "SENTRA_LOCK_MINUTES_CRITICAL",
                    default_safety.lock_minutes_critical,
                ),
                lock_minutes_default: env_or(
                    "SENTRA_LOCK_MINUTES_DEFAULT",
                    default_safety.lock_minutes_default,
                ),
                max_daily_loss: env_or("SENTRA_MAX_DAILY_LOSS", default_safety.max_daily_loss),
                max_drawdown_pct: env_or(
                    "SENTRA_MAX_DRAWDOWN_PCT",
                    default_safety.max_drawdown_pct,
                ),
                max_consecutive_losses: env_or(
                    "SENTRA_MAX_CONSECUTIVE_LOSSES",
                    default_safety.max_consecutive_losses,
                ),
                max_error_rate: env_or("SENTRA_MAX_ERROR_RATE", default_safety.max_error_rate),
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
