//! Data module - survey loading, schema and row filtering

mod dataset;
mod filter;
mod loader;
pub mod sample;

pub use dataset::{DatasetVersion, FieldKind, FieldSpec, SurveyDataset, SurveySchema};
pub use filter::FilterCriteria;
pub use loader::{DataLoader, DataSource};
