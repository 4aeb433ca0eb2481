//! Engine Configuration Module
//! Thresholds and field names that stay fixed for a deployment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// p-value cut-offs for the cross-tabulation concern label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcernThresholds {
    pub high_p: f64,
    pub medium_p: f64,
}

impl Default for ConcernThresholds {
    fn default() -> Self {
        Self {
            high_p: 0.01,
            medium_p: 0.05,
        }
    }
}

/// Percentage cut-offs for outcome prevalence (share of respondents reporting it).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrevalenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for PrevalenceThresholds {
    fn default() -> Self {
        Self {
            high: 40.0,
            medium: 25.0,
        }
    }
}

/// Cramér's V cut-offs for the effect-size label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSizeThresholds {
    pub moderate: f64,
    pub strong: f64,
}

impl Default for EffectSizeThresholds {
    fn default() -> Self {
        Self {
            moderate: 0.15,
            strong: 0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Survey-progress column; rows are kept only when it equals `completion_target`.
    pub completion_field: String,
    pub completion_target: f64,
    /// Apply the continuity correction to 2x2 tables.
    pub yates_correction: bool,
    pub concern: ConcernThresholds,
    pub prevalence: PrevalenceThresholds,
    pub effect_size: EffectSizeThresholds,
    /// Answers counted as "concerning" when summarizing categorical outcomes.
    pub concerning_values: Vec<String>,
    pub top_n: usize,
    pub role_field: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_field: "Progress".to_string(),
            completion_target: 100.0,
            yates_correction: false,
            concern: ConcernThresholds::default(),
            prevalence: PrevalenceThresholds::default(),
            effect_size: EffectSizeThresholds::default(),
            concerning_values: [
                "Very concerned",
                "Extremely concerned",
                "Significant disruptions",
                "Frequently",
                "Almost always",
                "Significant decline",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            top_n: 8,
            role_field: "Q2_Professional_Role".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; omitted keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.concern;
        if !(0.0 < c.high_p && c.high_p <= c.medium_p && c.medium_p < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "concern thresholds must satisfy 0 < high_p <= medium_p < 1 (got {} / {})",
                c.high_p, c.medium_p
            )));
        }
        if self.prevalence.medium > self.prevalence.high {
            return Err(ConfigError::Invalid(
                "prevalence.medium must not exceed prevalence.high".to_string(),
            ));
        }
        if self.effect_size.moderate > self.effect_size.strong {
            return Err(ConfigError::Invalid(
                "effect_size.moderate must not exceed effect_size.strong".to_string(),
            ));
        }
        if self.completion_field.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "completion_field must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
