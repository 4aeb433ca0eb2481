//! Row Filter Module
//! Field/value-set criteria applied as a row-wise AND.

use crate::data::dataset::SurveyDataset;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Accepted values per field. A row passes only if every listed field holds
/// one of its accepted values; a missing value never passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterCriteria {
    fields: BTreeMap<String, BTreeSet<String>>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FilterCriteria::insert`].
    pub fn with<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(field, values);
        self
    }

    /// Accept `values` for `field`, extending any values already accepted.
    pub fn insert<I, S>(&mut self, field: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .entry(field.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.fields.iter()
    }

    /// Which rows of `dataset` pass every criterion.
    pub fn mask(&self, dataset: &SurveyDataset) -> Result<Vec<bool>, AnalysisError> {
        let mut keep = vec![true; dataset.height()];
        for (field, accepted) in &self.fields {
            let labels = dataset.labels(field)?;
            for (slot, label) in keep.iter_mut().zip(labels) {
                *slot = *slot && label.is_some_and(|l| accepted.contains(&l));
            }
        }
        Ok(keep)
    }

    /// Rows of `dataset` passing every criterion.
    pub fn apply(&self, dataset: &SurveyDataset) -> Result<SurveyDataset, AnalysisError> {
        if self.is_empty() {
            return Ok(dataset.clone());
        }
        let keep = self.mask(dataset)?;
        dataset.subset(&keep)
    }

    /// Human-readable summary, e.g. `Q2_Professional_Role: Nurse, Physician`.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "No filters applied".to_string();
        }
        self.fields
            .iter()
            .map(|(field, values)| {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                format!("{}: {}", field, values.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
