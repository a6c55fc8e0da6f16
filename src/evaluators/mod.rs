pub mod condition;
pub mod filter;

pub use condition::{ConditionEvaluator, ConditionResult, RuleSetResult};
pub use filter::{FilterEvaluator, FilterOutcome, FilterResult};
