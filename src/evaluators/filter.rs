//! Trade gating filters, independent of entry/exit logic
//!
//! Every enabled filter is evaluated on its own; all of them must pass for
//! the cycle to proceed. A failure inside one filter (bad time spec, missing
//! quote data) fails that filter only and never the whole evaluation.

use crate::models::market::SymbolInfo;
use crate::models::strategy::{Filter, FilterKind, TradingSession};
use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FilterResult {
    pub filter: &'static str,
    pub passed: bool,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub passed: bool,
    pub results: Vec<FilterResult>,
}

impl FilterOutcome {
    fn pass_all() -> Self {
        Self {
            passed: true,
            results: Vec::new(),
        }
    }
}

pub struct FilterEvaluator;

impl FilterEvaluator {
    /// An empty or absent filter list passes trivially
    pub fn evaluate_filters(
        filters: &[Filter],
        symbol_info: &SymbolInfo,
        volatility: Option<f64>,
        now: DateTime<Utc>,
    ) -> FilterOutcome {
        if filters.is_empty() {
            return FilterOutcome::pass_all();
        }

        let mut results = Vec::with_capacity(filters.len());
        for filter in filters.iter().filter(|f| f.enabled) {
            let result = Self::evaluate_one(filter, symbol_info, volatility, now);
            if !result.passed {
                debug!(
                    filter = result.filter,
                    reason = %result.reason,
                    symbol = %symbol_info.symbol,
                    "filter rejected cycle"
                );
            }
            results.push(result);
        }

        FilterOutcome {
            passed: results.iter().all(|r| r.passed),
            results,
        }
    }

    fn evaluate_one(
        filter: &Filter,
        symbol_info: &SymbolInfo,
        volatility: Option<f64>,
        now: DateTime<Utc>,
    ) -> FilterResult {
        let label = filter.kind.label();
        let (passed, reason) = match &filter.kind {
            FilterKind::Time { start, end } => Self::check_time(start, end, now),
            FilterKind::Session { allowed_sessions } => Self::check_session(allowed_sessions, now),
            FilterKind::Spread { max_pips } => {
                let pips = symbol_info.spread_pips();
                (
                    pips <= *max_pips,
                    format!("spread {:.1} pips vs max {:.1}", pips, max_pips),
                )
            }
            FilterKind::Volatility { min, max } => Self::check_volatility(*min, *max, volatility),
            FilterKind::DayOfWeek { allowed_days } => {
                let today = now.weekday().num_days_from_sunday();
                (
                    allowed_days.contains(&today),
                    format!("day {} allowed {:?}", today, allowed_days),
                )
            }
            FilterKind::News => {
                // News calendar integration is not implemented; fail-open
                (true, "news filter not implemented".to_string())
            }
            FilterKind::Unknown => {
                warn!(symbol = %symbol_info.symbol, "unrecognized filter type, passing by default");
                (true, "unrecognized filter type".to_string())
            }
        };

        FilterResult {
            filter: label,
            passed,
            reason,
        }
    }

    /// HH:MM range in UTC; start > end is an overnight window spanning midnight
    fn check_time(start: &str, end: &str, now: DateTime<Utc>) -> (bool, String) {
        let (Some(start_min), Some(end_min)) = (parse_hhmm(start), parse_hhmm(end)) else {
            return (false, format!("invalid time range {}-{}", start, end));
        };
        let now_min = now.hour() * 60 + now.minute();
        let inside = if start_min <= end_min {
            now_min >= start_min && now_min <= end_min
        } else {
            now_min >= start_min || now_min <= end_min
        };
        (
            inside,
            format!("{:02}:{:02} within {}-{}", now.hour(), now.minute(), start, end),
        )
    }

    fn check_session(allowed: &[TradingSession], now: DateTime<Utc>) -> (bool, String) {
        let session = classify_session(now.hour());
        (
            allowed.contains(&session),
            format!("session {:?} allowed {:?}", session, allowed),
        )
    }

    fn check_volatility(
        min: Option<f64>,
        max: Option<f64>,
        volatility: Option<f64>,
    ) -> (bool, String) {
        // Pass when no figure is available; the filter gates on known values only
        let Some(vol) = volatility else {
            return (true, "volatility unavailable".to_string());
        };
        if let Some(min) = min {
            if vol < min {
                return (false, format!("volatility {:.5} below min {:.5}", vol, min));
            }
        }
        if let Some(max) = max {
            if vol > max {
                return (false, format!("volatility {:.5} above max {:.5}", vol, max));
            }
        }
        (true, format!("volatility {:.5} within bounds", vol))
    }
}

/// UTC-hour session buckets: ASIAN [0,9), LONDON [8,17), else NEWYORK
fn classify_session(hour: u32) -> TradingSession {
    if hour < 9 {
        TradingSession::Asian
    } else if (8..17).contains(&hour) {
        TradingSession::London
    } else {
        TradingSession::NewYork
    }
}

fn parse_hhmm(value: &str) -> Option<u32> {
    let (h, m) = value.split_once(':')?;
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}
