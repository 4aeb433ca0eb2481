//! Survey Insight - survey cross-tabulation & summary engine
//!
//! Loads survey responses, keeps complete ones, and computes contingency
//! tables, chi-square tests, filtered summaries and indicator rankings.

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod indicators;
pub mod session;
pub mod stats;

pub use config::EngineConfig;
pub use data::{DataLoader, DataSource, FilterCriteria, SurveyDataset};
pub use error::{AnalysisError, ConfigError, ExportError, LoadError};
pub use session::{IndicatorReport, RateComparison, Session};
pub use stats::{ContingencyResult, CountTable, CrossTabulator, SummaryEngine, SummaryResult};
