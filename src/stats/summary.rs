//! Summary Module
//! Filtered group counts, frequency tables and yes/no indicator rankings.

use crate::config::EngineConfig;
use crate::data::{FilterCriteria, SurveyDataset};
use crate::error::AnalysisError;
use log::debug;
use serde::Serialize;

/// Count and share of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupShare {
    pub label: String,
    pub count: u64,
    /// Percent of rows with a value in the field.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    /// Rows in the dataset before filtering.
    pub total_rows: usize,
    /// Rows passing every filter.
    pub filtered_rows: usize,
    pub filters: String,
    pub group_field: Option<String>,
    /// Per-category counts of the filtered rows, first-seen order.
    pub groups: Option<Vec<GroupShare>>,
    /// Filtered rows with no value in the group field.
    pub missing_group: usize,
}

/// Proportion of "yes" answers in one yes/no field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRate {
    pub field: String,
    pub responses: u64,
    pub positives: u64,
    /// positives / responses, in 0..=1.
    pub proportion: f64,
}

impl IndicatorRate {
    pub fn percentage(&self) -> f64 {
        self.proportion * 100.0
    }
}

/// Share of "yes" answers to one yes/no field within one category of a grouping field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRate {
    pub group: String,
    pub field: String,
    pub positives: u64,
    /// Answered rows of the field within the group.
    pub total: u64,
    /// positives / total, as a percentage.
    pub rate: f64,
}

/// Headline numbers for the whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub complete: usize,
    pub excluded: usize,
    pub submitted: usize,
    pub completion_rate: f64,
    pub fields: usize,
    pub role_field: Option<String>,
    pub roles: Vec<GroupShare>,
    pub top_indicators: Vec<IndicatorRate>,
}

/// Handles filtering and aggregate counts.
pub struct SummaryEngine;

impl SummaryEngine {
    /// Apply `filters`, then optionally count the remaining rows per `group_field` value.
    pub fn summarize(
        dataset: &SurveyDataset,
        filters: &FilterCriteria,
        group_field: Option<&str>,
    ) -> Result<SummaryResult, AnalysisError> {
        if let Some(field) = group_field {
            dataset.schema().require(field)?;
        }

        let filtered = filters.apply(dataset)?;
        debug!(
            "summarize: {} of {} rows pass [{}]",
            filtered.height(),
            dataset.height(),
            filters.describe()
        );

        let (groups, missing_group) = match group_field {
            Some(field) => {
                let missing = filtered.missing_count(field)?;
                (Some(Self::frequency_table(&filtered, field)?), missing)
            }
            None => (None, 0),
        };

        Ok(SummaryResult {
            total_rows: dataset.height(),
            filtered_rows: filtered.height(),
            filters: filters.describe(),
            group_field: group_field.map(str::to_string),
            groups,
            missing_group,
        })
    }

    /// Counts per category of `field` in first-seen order; missing values are left out.
    pub fn frequency_table(
        dataset: &SurveyDataset,
        field: &str,
    ) -> Result<Vec<GroupShare>, AnalysisError> {
        let mut shares: Vec<GroupShare> = Vec::new();
        for label in dataset.labels(field)?.into_iter().flatten() {
            match shares.iter_mut().find(|s| s.label == label) {
                Some(share) => share.count += 1,
                None => shares.push(GroupShare {
                    label,
                    count: 1,
                    percentage: 0.0,
                }),
            }
        }

        let total: u64 = shares.iter().map(|s| s.count).sum();
        for share in shares.iter_mut() {
            share.percentage = if total == 0 {
                0.0
            } else {
                share.count as f64 / total as f64 * 100.0
            };
        }
        Ok(shares)
    }

    /// Rank yes/no fields by proportion of "yes", highest first, keeping at most `top_n`.
    ///
    /// Ties keep the order of `fields`. Fields with no answers are left out.
    pub fn rank_indicators<S: AsRef<str>>(
        dataset: &SurveyDataset,
        fields: &[S],
        top_n: usize,
    ) -> Result<Vec<IndicatorRate>, AnalysisError> {
        let mut rates = Vec::with_capacity(fields.len());
        for field in fields {
            let field = field.as_ref();
            let flags = dataset.flags(field)?;
            let responses = flags.iter().flatten().count() as u64;
            if responses == 0 {
                debug!("rank_indicators: {} has no answers", field);
                continue;
            }
            let positives = flags.iter().flatten().filter(|f| **f).count() as u64;
            rates.push(IndicatorRate {
                field: field.to_string(),
                responses,
                positives,
                proportion: positives as f64 / responses as f64,
            });
        }

        rates.sort_by(|a, b| {
            b.proportion
                .partial_cmp(&a.proportion)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rates.truncate(top_n);
        Ok(rates)
    }

    /// Rate of each yes/no field within each category of `group_field`.
    ///
    /// Groups come in first-seen order, and `fields` keep their order within a group.
    /// Cells with no answers are left out.
    pub fn group_rates<S: AsRef<str>>(
        dataset: &SurveyDataset,
        fields: &[S],
        group_field: &str,
    ) -> Result<Vec<GroupRate>, AnalysisError> {
        let labels = dataset.labels(group_field)?;
        let groups = dataset.unique_labels(group_field)?;
        let flags = fields
            .iter()
            .map(|field| Ok((field.as_ref(), dataset.flags(field.as_ref())?)))
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        let mut rates = Vec::with_capacity(groups.len() * flags.len());
        for group in &groups {
            for (field, values) in &flags {
                let (mut positives, mut total) = (0u64, 0u64);
                for (label, flag) in labels.iter().zip(values) {
                    if label.as_deref() != Some(group.as_str()) {
                        continue;
                    }
                    if let Some(flag) = flag {
                        total += 1;
                        positives += u64::from(*flag);
                    }
                }
                if total == 0 {
                    continue;
                }
                rates.push(GroupRate {
                    group: group.clone(),
                    field: field.to_string(),
                    positives,
                    total,
                    rate: positives as f64 / total as f64 * 100.0,
                });
            }
        }
        debug!(
            "group_rates: {} fields x {} groups of {}",
            flags.len(),
            groups.len(),
            group_field
        );
        Ok(rates)
    }

    /// Highest rate; the earliest one wins a tie.
    pub fn highest_rate(rates: &[GroupRate]) -> Option<&GroupRate> {
        rates
            .iter()
            .fold(None, |best: Option<&GroupRate>, r| match best {
                Some(b) if b.rate >= r.rate => Some(b),
                _ => Some(r),
            })
    }

    /// Lowest rate; the earliest one wins a tie.
    pub fn lowest_rate(rates: &[GroupRate]) -> Option<&GroupRate> {
        rates
            .iter()
            .fold(None, |best: Option<&GroupRate>, r| match best {
                Some(b) if b.rate <= r.rate => Some(b),
                _ => Some(r),
            })
    }

    /// Completion counts, the role distribution and the top-ranked indicator fields.
    ///
    /// Ranking fields absent from the dataset are skipped.
    pub fn overview<S: AsRef<str>>(
        dataset: &SurveyDataset,
        config: &EngineConfig,
        ranking_fields: &[S],
    ) -> Result<Overview, AnalysisError> {
        let role_field = dataset
            .schema()
            .contains(&config.role_field)
            .then(|| config.role_field.clone());

        let roles = match &role_field {
            Some(field) => Self::frequency_table(dataset, field)?,
            None => Vec::new(),
        };

        let present: Vec<&str> = ranking_fields
            .iter()
            .map(AsRef::as_ref)
            .filter(|f| dataset.schema().contains(f))
            .collect();
        let top_indicators = Self::rank_indicators(dataset, &present, config.top_n)?;

        Ok(Overview {
            complete: dataset.height(),
            excluded: dataset.excluded(),
            submitted: dataset.submitted(),
            completion_rate: dataset.completion_rate(),
            fields: dataset.schema().fields().len(),
            role_field,
            roles,
            top_indicators,
        })
    }
}
