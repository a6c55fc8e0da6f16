//! Lot sizing from the strategy's position-size policy

use crate::models::strategy::PositionSizePolicy;
use tracing::trace;

/// Fallback lot size when inputs are degenerate
const MIN_FALLBACK_LOTS: f64 = 0.01;

/// Account figures needed for risk-based sizing
#[derive(Debug, Clone, Copy)]
pub struct AccountSnapshot {
    pub balance: f64,
    /// Value of one pip per standard lot, in account currency
    pub pip_value: f64,
}

impl Default for AccountSnapshot {
    fn default() -> Self {
        Self {
            balance: 0.0,
            pip_value: 10.0,
        }
    }
}

pub struct PositionSizer;

impl PositionSizer {
    /// Lots for a proposed trade before correlation adjustment
    pub fn size(
        policy: &PositionSizePolicy,
        account: &AccountSnapshot,
        stop_loss_pips: f64,
    ) -> f64 {
        match policy {
            PositionSizePolicy::FixedLots { lots } => *lots,
            PositionSizePolicy::RiskPercent {
                risk_pct,
                min_lot,
                max_lot,
            } => {
                if account.pip_value <= 0.0 || stop_loss_pips <= 0.0 {
                    return MIN_FALLBACK_LOTS;
                }
                let risk_amount = account.balance * (risk_pct / 100.0);
                let lots = risk_amount / (account.pip_value * stop_loss_pips);
                let clamped = lots.clamp(*min_lot, *max_lot);
                trace!(
                    risk_pct,
                    stop_loss_pips,
                    lots,
                    clamped,
                    "risk-percent position size"
                );
                clamped
            }
        }
    }
}
