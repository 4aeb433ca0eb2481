//! Descriptive Statistics Module
//! Indicator outcome prevalence, grouped numeric statistics and field completeness.

use crate::config::{EngineConfig, PrevalenceThresholds};
use crate::data::{FieldKind, SurveyDataset};
use crate::error::AnalysisError;
use crate::indicators;
use crate::stats::summary::{GroupShare, SummaryEngine};
use log::debug;
use rayon::prelude::*;
use serde::Serialize;

/// Prevalence level of an outcome among respondents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConcernLevel {
    High,
    Medium,
    Low,
}

impl ConcernLevel {
    pub fn classify(percentage: f64, thresholds: &PrevalenceThresholds) -> Self {
        if percentage > thresholds.high {
            ConcernLevel::High
        } else if percentage > thresholds.medium {
            ConcernLevel::Medium
        } else {
            ConcernLevel::Low
        }
    }
}

/// Prevalence summary of one indicator outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    pub field: String,
    pub kind: FieldKind,
    /// Non-missing answers.
    pub responses: u64,
    /// "Yes" answers for binary fields; concerning answers for categorical ones.
    pub positives: u64,
    pub percentage: f64,
    pub concern: ConcernLevel,
    /// Answer distribution, categorical fields only.
    pub categories: Option<Vec<GroupShare>>,
    /// Outcome group the field is ranked within.
    pub group: &'static str,
    /// 1 = highest percentage within `group`.
    pub rank: usize,
    pub top_ranked: bool,
}

const SERVICE_DISRUPTIONS: &str = "Service Disruptions";
const AFFECTED_POPULATIONS: &str = "Populations Most Affected";
const OUTCOMES: &str = "Outcomes";

/// Disrupted services and affected populations are ranked apart from each other.
fn outcome_group(field: &str) -> &'static str {
    if field.starts_with("Q9_") {
        SERVICE_DISRUPTIONS
    } else if field.starts_with("Q10_Pop_") {
        AFFECTED_POPULATIONS
    } else {
        OUTCOMES
    }
}

fn group_order(group: &str) -> usize {
    match group {
        SERVICE_DISRUPTIONS => 0,
        AFFECTED_POPULATIONS => 1,
        _ => 2,
    }
}

/// Numeric summary of one category of a grouping field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub group: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for a single value.
    pub std_dev: f64,
    pub p05: f64,
    pub p95: f64,
}

impl GroupStats {
    /// Summarize the values of one group; `None` when there are none.
    pub fn from_values(group: impl Into<String>, mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let squared: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        let std_dev = if values.len() > 1 {
            (squared / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            group: group.into(),
            count: values.len(),
            mean,
            median: quantile(&values, 0.5),
            std_dev,
            p05: quantile(&values, 0.05),
            p95: quantile(&values, 0.95),
        })
    }
}

/// Quantile of sorted, non-empty `values`, interpolating linearly between ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let weight = position - below as f64;
    sorted[below] + (sorted[above] - sorted[below]) * weight
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl DataQuality {
    pub fn classify(completeness: f64) -> Self {
        if completeness >= 95.0 {
            DataQuality::Excellent
        } else if completeness >= 85.0 {
            DataQuality::Good
        } else if completeness >= 70.0 {
            DataQuality::Fair
        } else {
            DataQuality::Poor
        }
    }
}

/// How many rows answer one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCompleteness {
    pub field: String,
    pub complete: usize,
    pub total: usize,
    pub completeness: f64,
    pub quality: DataQuality,
}

/// Handles descriptive statistics with multi-threading support.
pub struct DescriptiveStats;

impl DescriptiveStats {
    /// Statistics of `value_field` for each category of `group_field`, first-seen order.
    pub fn grouped_numeric_stats(
        dataset: &SurveyDataset,
        group_field: &str,
        value_field: &str,
    ) -> Result<Vec<GroupStats>, AnalysisError> {
        let groups = dataset.labels(group_field)?;
        let values = dataset.numbers(value_field)?;

        let mut by_group: Vec<(String, Vec<f64>)> = Vec::new();
        for (group, value) in groups.into_iter().zip(values) {
            let (Some(group), Some(value)) = (group, value) else {
                continue;
            };
            match by_group.iter_mut().find(|(g, _)| *g == group) {
                Some((_, vals)) => vals.push(value),
                None => by_group.push((group, vec![value])),
            }
        }

        if by_group.is_empty() {
            return Err(AnalysisError::variation(format!(
                "no rows have values for both {group_field} and {value_field}"
            )));
        }

        Ok(by_group
            .into_par_iter()
            .filter_map(|(group, vals)| GroupStats::from_values(group, vals))
            .collect())
    }

    fn describe_outcome(
        dataset: &SurveyDataset,
        field: &str,
        kind: FieldKind,
        config: &EngineConfig,
    ) -> Result<OutcomeSummary, AnalysisError> {
        let (responses, positives, categories) = match kind {
            FieldKind::Binary => {
                let flags = dataset.flags(field)?;
                let responses = flags.iter().flatten().count() as u64;
                let positives = flags.iter().flatten().filter(|f| **f).count() as u64;
                (responses, positives, None)
            }
            FieldKind::Categorical | FieldKind::Numeric => {
                let table = SummaryEngine::frequency_table(dataset, field)?;
                let responses: u64 = table.iter().map(|s| s.count).sum();
                let positives: u64 = table
                    .iter()
                    .filter(|s| config.concerning_values.contains(&s.label))
                    .map(|s| s.count)
                    .sum();
                (responses, positives, Some(table))
            }
        };

        let percentage = if responses == 0 {
            0.0
        } else {
            positives as f64 / responses as f64 * 100.0
        };

        Ok(OutcomeSummary {
            field: field.to_string(),
            kind,
            responses,
            positives,
            percentage,
            concern: ConcernLevel::classify(percentage, &config.prevalence),
            categories,
            group: outcome_group(field),
            rank: 0,
            top_ranked: false,
        })
    }

    /// Prevalence of each outcome of an indicator set present in the dataset,
    /// ranked by percentage within each outcome group.
    pub fn describe_indicator_set(
        dataset: &SurveyDataset,
        indicator_id: u8,
        config: &EngineConfig,
    ) -> Result<Vec<OutcomeSummary>, AnalysisError> {
        let set = indicators::indicator_set(indicator_id)?;
        let present: Vec<(&str, FieldKind)> = set
            .outcomes
            .iter()
            .filter_map(|f| dataset.schema().get(f).map(|spec| (*f, spec.kind)))
            .collect();
        debug!(
            "describe_indicator_set {}: {} of {} outcomes present",
            indicator_id,
            present.len(),
            set.outcomes.len()
        );

        let mut summaries = present
            .par_iter()
            .map(|(field, kind)| Self::describe_outcome(dataset, field, *kind, config))
            .collect::<Result<Vec<_>, _>>()?;

        summaries.sort_by(|a, b| {
            group_order(a.group).cmp(&group_order(b.group)).then(
                b.percentage
                    .partial_cmp(&a.percentage)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        let mut rank = 0;
        let mut current = None;
        for summary in summaries.iter_mut() {
            if current != Some(summary.group) {
                current = Some(summary.group);
                rank = 0;
            }
            rank += 1;
            summary.rank = rank;
            summary.top_ranked = rank == 1;
        }
        Ok(summaries)
    }

    /// Non-missing share of every field, most complete first.
    pub fn completeness_report(
        dataset: &SurveyDataset,
    ) -> Result<Vec<FieldCompleteness>, AnalysisError> {
        let total = dataset.height();
        let mut report = dataset
            .schema()
            .fields()
            .par_iter()
            .map(|spec| -> Result<FieldCompleteness, AnalysisError> {
                let complete = total - dataset.missing_count(&spec.name)?;
                let completeness = if total == 0 {
                    0.0
                } else {
                    complete as f64 / total as f64 * 100.0
                };
                Ok(FieldCompleteness {
                    field: spec.name.clone(),
                    complete,
                    total,
                    completeness,
                    quality: DataQuality::classify(completeness),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        report.sort_by(|a, b| {
            b.completeness
                .partial_cmp(&a.completeness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLoader, DataSource, DatasetVersion};
    use polars::prelude::*;

    fn dataset() -> SurveyDataset {
        let df = DataFrame::new(vec![
            Column::new("Role".into(), vec!["Nurse", "Nurse", "Physician", "Physician", "Physician"]),
            Column::new("Years".into(), vec![Some(2.0f64), Some(4.0), Some(10.0), None, Some(20.0)]),
            Column::new("Notes".into(), vec![None, None, Some("x"), None, None::<&str>]),
        ])
        .unwrap();
        DataLoader::from_frame(df, DatasetVersion::of_bytes(b"desc"), &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn group_stats_interpolate_quantiles() {
        let stats = GroupStats::from_values("All", vec![4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert!((stats.p95 - 3.85).abs() < 1e-12);
        assert!((stats.p05 - 1.15).abs() < 1e-12);
        assert!((stats.std_dev - 1.290_994_448_735_805_6).abs() < 1e-12);

        let single = GroupStats::from_values("One", vec![7.0]).unwrap();
        assert_eq!((single.median, single.std_dev, single.p95), (7.0, 0.0, 7.0));
        assert!(GroupStats::from_values("None", Vec::new()).is_none());
    }

    #[test]
    fn grouped_stats_skip_missing_values() {
        let ds = dataset();
        let stats = DescriptiveStats::grouped_numeric_stats(&ds, "Role", "Years").unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].group, "Nurse");
        assert_eq!(stats[0].mean, 3.0);
        assert_eq!(stats[1].group, "Physician");
        assert_eq!(stats[1].count, 2);
        assert_eq!(stats[1].median, 15.0);
    }

    #[test]
    fn completeness_labels_quality() {
        let ds = dataset();
        let report = DescriptiveStats::completeness_report(&ds).unwrap();
        assert_eq!(report[0].quality, DataQuality::Excellent);
        let years = report.iter().find(|r| r.field == "Years").unwrap();
        assert_eq!(years.complete, 4);
        assert_eq!(years.quality, DataQuality::Fair);
        let notes = report.last().unwrap();
        assert_eq!(notes.field, "Notes");
        assert_eq!(notes.quality, DataQuality::Poor);
    }

    #[test]
    fn indicator_outcomes_are_ranked() {
        let config = EngineConfig::default();
        let ds = DataLoader::load(&DataSource::Sample, &config).unwrap();
        let summaries = DescriptiveStats::describe_indicator_set(&ds, 4, &config).unwrap();
        assert_eq!(summaries.len(), 4);
        assert!(summaries
            .windows(2)
            .all(|w| w[0].percentage >= w[1].percentage));
        assert_eq!(summaries[0].rank, 1);
        assert!(summaries.iter().all(|s| s.categories.is_some()));
        assert!(summaries.iter().all(|s| s.responses == 526));
    }

    #[test]
    fn services_and_populations_rank_separately() {
        let config = EngineConfig::default();
        let ds = DataLoader::load(&DataSource::Sample, &config).unwrap();
        let summaries = DescriptiveStats::describe_indicator_set(&ds, 1, &config).unwrap();

        let services: Vec<&OutcomeSummary> = summaries
            .iter()
            .filter(|s| s.field.starts_with("Q9_"))
            .collect();
        let populations: Vec<&OutcomeSummary> = summaries
            .iter()
            .filter(|s| s.field.starts_with("Q10_Pop_"))
            .collect();
        assert!(!services.is_empty() && !populations.is_empty());
        assert_eq!(services.len() + populations.len(), summaries.len());

        // services come first, each block ranked from 1
        assert!(summaries[..services.len()]
            .iter()
            .all(|s| s.group == "Service Disruptions"));
        for block in [&services, &populations] {
            let ranks: Vec<usize> = block.iter().map(|s| s.rank).collect();
            assert_eq!(ranks, (1..=block.len()).collect::<Vec<_>>());
            assert!(block.windows(2).all(|w| w[0].percentage >= w[1].percentage));
            assert_eq!(block.iter().filter(|s| s.top_ranked).count(), 1);
            assert!(block[0].top_ranked);
        }
    }

    #[test]
    fn prevalence_thresholds_classify() {
        let t = PrevalenceThresholds::default();
        assert_eq!(ConcernLevel::classify(41.0, &t), ConcernLevel::High);
        assert_eq!(ConcernLevel::classify(40.0, &t), ConcernLevel::Medium);
        assert_eq!(ConcernLevel::classify(25.0, &t), ConcernLevel::Low);
    }
}
