//! Error Types Module
//! Load and analysis failures reported to the caller, never fatal to the host.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("No complete responses remain after filtering")]
    EmptyResult,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Unknown indicator set: {0} (expected 1-5)")]
    UnknownIndicatorSet(u8),
    #[error("Insufficient variation: {0}")]
    InsufficientVariation(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl AnalysisError {
    pub(crate) fn variation(reason: impl Into<String>) -> Self {
        AnalysisError::InsufficientVariation(reason.into())
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Export is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("Missing export column: {0}")]
    MissingColumn(&'static str),
    #[error("Invalid count {value:?} on line {line}")]
    InvalidCount { line: usize, value: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
