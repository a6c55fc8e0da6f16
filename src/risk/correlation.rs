//! Correlation risk engine
//!
//! Maintains a symmetric, TTL'd correlation matrix and decides whether a
//! proposed trade should proceed, shrink, or be flagged as a hedge given the
//! currently open positions. Lookups that miss the matrix (or hit a stale
//! entry) fall back to a static table of well-known pair relationships, then
//! to a non-significant default.

use crate::models::market::OpenPosition;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Pairs with no cached or tabled relationship are treated as uncorrelated
const DEFAULT_COEFFICIENT: f64 = 0.1;
/// Minimum paired samples for a statistically meaningful coefficient
const MIN_SAMPLES: usize = 30;

/// Static fallback for well-known FX relationships, used when the matrix has
/// no fresh entry for a pair
const STATIC_CORRELATIONS: &[(&str, &str, f64)] = &[
    ("EURUSD", "GBPUSD", 0.89),
    ("EURUSD", "USDCHF", -0.92),
    ("EURUSD", "USDJPY", -0.25),
    ("EURUSD", "AUDUSD", 0.65),
    ("GBPUSD", "USDCHF", -0.80),
    ("GBPUSD", "EURGBP", -0.85),
    ("AUDUSD", "NZDUSD", 0.87),
    ("AUDUSD", "USDCAD", -0.62),
    ("USDJPY", "XAUUSD", -0.40),
];

#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Positions with |correlation| above this count as correlated exposure
    pub threshold: f64,
    /// Entries older than this are stale and recomputed before use
    pub refresh_window: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            refresh_window: Duration::from_secs(60 * 60),
        }
    }
}

/// One cell of the correlation matrix
#[derive(Debug, Clone)]
pub struct CorrelationEntry {
    pub coefficient: f64,
    pub computed_at: Instant,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    Proceed,
    ReduceSize,
    HedgeOpportunity,
}

/// An open position that counts as correlated exposure
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedExposure {
    pub ticket: u64,
    pub symbol: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationAssessment {
    pub action: RiskAction,
    pub adjusted_volume: f64,
    pub confidence: u8,
    pub max_abs_correlation: f64,
    pub correlated: Vec<CorrelatedExposure>,
    pub reason: String,
}

pub struct CorrelationRiskEngine {
    config: CorrelationConfig,
    matrix: RwLock<HashMap<(String, String), CorrelationEntry>>,
}

impl CorrelationRiskEngine {
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            config,
            matrix: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CorrelationConfig::default())
    }

    /// Store a coefficient for both orderings of the pair
    pub fn set_correlation(&self, a: &str, b: &str, coefficient: f64, samples: usize) {
        let coefficient = coefficient.clamp(-1.0, 1.0);
        let entry = CorrelationEntry {
            coefficient,
            computed_at: Instant::now(),
            samples,
        };
        let mut matrix = self.matrix.write().expect("correlation matrix lock poisoned");
        matrix.insert((normalize(a), normalize(b)), entry.clone());
        matrix.insert((normalize(b), normalize(a)), entry);
    }

    /// Pearson-update the matrix from two equal-length return series
    pub fn update_from_series(&self, a: &str, b: &str, xs: &[f64], ys: &[f64]) -> f64 {
        let coefficient = pearson(xs, ys);
        self.set_correlation(a, b, coefficient, xs.len().min(ys.len()));
        coefficient
    }

    /// Current coefficient for a pair: fresh matrix entry, else static table,
    /// else the non-significant default. Identical symbols are trivially 1.0.
    pub fn correlation(&self, a: &str, b: &str) -> f64 {
        let (a, b) = (normalize(a), normalize(b));
        if a == b {
            return 1.0;
        }

        {
            let matrix = self.matrix.read().expect("correlation matrix lock poisoned");
            if let Some(entry) = matrix.get(&(a.clone(), b.clone())) {
                if entry.computed_at.elapsed() < self.config.refresh_window {
                    return entry.coefficient;
                }
                debug!(pair = %format!("{}/{}", a, b), "correlation entry stale, using fallback");
            }
        }

        static_correlation(&a, &b).unwrap_or(DEFAULT_COEFFICIENT)
    }

    /// Decide whether and how much to reduce a proposed trade given the open
    /// positions currently held
    pub fn assess(
        &self,
        symbol: &str,
        proposed_volume: f64,
        positions: &[OpenPosition],
    ) -> CorrelationAssessment {
        let correlated: Vec<CorrelatedExposure> = positions
            .iter()
            .filter_map(|p| {
                let coefficient = self.correlation(symbol, &p.symbol);
                let significant = normalize(&p.symbol) == normalize(symbol)
                    || coefficient.abs() > self.config.threshold;
                significant.then(|| CorrelatedExposure {
                    ticket: p.ticket,
                    symbol: p.symbol.clone(),
                    coefficient,
                })
            })
            .collect();

        if correlated.is_empty() {
            return CorrelationAssessment {
                action: RiskAction::Proceed,
                adjusted_volume: proposed_volume,
                confidence: 100,
                max_abs_correlation: 0.0,
                correlated,
                reason: "no correlated exposure".to_string(),
            };
        }

        let max_abs = correlated
            .iter()
            .map(|c| c.coefficient.abs())
            .fold(0.0_f64, f64::max);
        let min_coefficient = correlated
            .iter()
            .map(|c| c.coefficient)
            .fold(f64::INFINITY, f64::min);

        let (action, factor, confidence, reason) = if max_abs > 0.9 {
            (RiskAction::ReduceSize, 0.3, 60, "extreme correlated exposure")
        } else if max_abs > 0.8 {
            (RiskAction::ReduceSize, 0.5, 75, "high correlated exposure")
        } else if max_abs > 0.7 {
            (RiskAction::ReduceSize, 0.7, 85, "moderate correlated exposure")
        } else if min_coefficient < -0.7 {
            (
                RiskAction::HedgeOpportunity,
                1.0,
                80,
                "negatively correlated exposure, hedge opportunity",
            )
        } else {
            (RiskAction::Proceed, 1.0, 95, "correlated exposure within limits")
        };

        let assessment = CorrelationAssessment {
            action,
            adjusted_volume: proposed_volume * factor,
            confidence,
            max_abs_correlation: max_abs,
            correlated,
            reason: reason.to_string(),
        };

        if assessment.action != RiskAction::Proceed {
            info!(
                symbol,
                action = ?assessment.action,
                max_abs_correlation = assessment.max_abs_correlation,
                adjusted_volume = assessment.adjusted_volume,
                "correlation risk adjustment"
            );
        }

        assessment
    }

    pub fn matrix_len(&self) -> usize {
        self.matrix.read().expect("correlation matrix lock poisoned").len()
    }
}

/// Pearson correlation over equal-length paired series. Returns 0 when fewer
/// than the minimum samples are available or the denominator degenerates.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < MIN_SAMPLES {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    covariance / denominator
}

fn normalize(symbol: &str) -> String {
    symbol.to_ascii_uppercase()
}

fn static_correlation(a: &str, b: &str) -> Option<f64> {
    STATIC_CORRELATIONS
        .iter()
        .find(|(x, y, _)| (x == &a && y == &b) || (x == &b && y == &a))
        .map(|(_, _, c)| *c)
}
