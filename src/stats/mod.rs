//! Stats module - Cross-tabulation, summaries, correlation and descriptive statistics

mod correlation;
mod crosstab;
mod descriptive;
mod summary;

pub use correlation::{CorrelationEngine, CorrelationMatrix, CorrelationStrength};
pub use crosstab::{
    Concern, ConcernTally, ContingencyResult, CountTable, CrossTabulator, EffectSize,
    IndicatorCrossTab,
};
pub use descriptive::{
    ConcernLevel, DataQuality, DescriptiveStats, FieldCompleteness, GroupStats, OutcomeSummary,
};
pub use summary::{
    GroupRate, GroupShare, IndicatorRate, Overview, SummaryEngine, SummaryResult,
};
