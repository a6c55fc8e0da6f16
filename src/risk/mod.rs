pub mod correlation;
pub mod sizing;

pub use correlation::{
    CorrelationAssessment, CorrelationConfig, CorrelationRiskEngine, RiskAction,
};
pub use sizing::{AccountSnapshot, PositionSizer};
