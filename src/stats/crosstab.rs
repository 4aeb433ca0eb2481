//! Cross-Tabulation Module
//! Contingency tables with Pearson chi-square, Cramér's V and a concern label.

use crate::config::{ConcernThresholds, EffectSizeThresholds, EngineConfig};
use crate::data::SurveyDataset;
use crate::error::AnalysisError;
use crate::indicators;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::HashMap;

/// Concern level derived from the chi-square p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Concern {
    High,
    Medium,
    Low,
}

impl Concern {
    pub fn classify(p_value: f64, thresholds: &ConcernThresholds) -> Self {
        if p_value < thresholds.high_p {
            Concern::High
        } else if p_value < thresholds.medium_p {
            Concern::Medium
        } else {
            Concern::Low
        }
    }
}

/// Strength of association derived from Cramér's V.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectSize {
    Weak,
    Moderate,
    Strong,
}

impl EffectSize {
    pub fn classify(cramers_v: f64, thresholds: &EffectSizeThresholds) -> Self {
        if cramers_v > thresholds.strong {
            EffectSize::Strong
        } else if cramers_v > thresholds.moderate {
            EffectSize::Moderate
        } else {
            EffectSize::Weak
        }
    }
}

/// Observed counts; rows are outcome categories, columns group categories,
/// both in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTable {
    pub outcome_categories: Vec<String>,
    pub group_categories: Vec<String>,
    /// `counts[outcome][group]`
    pub counts: Vec<Vec<u64>>,
}

impl CountTable {
    /// Tally (outcome, group) pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = CountTable::default();
        let mut outcome_index: HashMap<&'a str, usize> = HashMap::new();
        let mut group_index: HashMap<&'a str, usize> = HashMap::new();

        for (outcome, group) in pairs {
            let row = *outcome_index.entry(outcome).or_insert_with(|| {
                table.outcome_categories.push(outcome.to_string());
                table
                    .counts
                    .push(vec![0; table.group_categories.len()]);
                table.outcome_categories.len() - 1
            });
            let col = *group_index.entry(group).or_insert_with(|| {
                table.group_categories.push(group.to_string());
                for counts in table.counts.iter_mut() {
                    counts.push(0);
                }
                table.group_categories.len() - 1
            });
            table.counts[row][col] += 1;
        }

        table
    }

    /// Add `count` observations of one (outcome, group) cell.
    pub fn add(&mut self, outcome: &str, group: &str, count: u64) {
        let row = match self.outcome_categories.iter().position(|c| c == outcome) {
            Some(row) => row,
            None => {
                self.outcome_categories.push(outcome.to_string());
                self.counts.push(vec![0; self.group_categories.len()]);
                self.outcome_categories.len() - 1
            }
        };
        let col = match self.group_categories.iter().position(|c| c == group) {
            Some(col) => col,
            None => {
                self.group_categories.push(group.to_string());
                for counts in self.counts.iter_mut() {
                    counts.push(0);
                }
                self.group_categories.len() - 1
            }
        };
        self.counts[row][col] += count;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn outcome_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn group_totals(&self) -> Vec<u64> {
        (0..self.group_categories.len())
            .map(|col| self.counts.iter().map(|row| row[col]).sum())
            .collect()
    }

    /// Outcome distribution within each group category, `[group][outcome]`, in percent.
    pub fn row_percentages(&self) -> Vec<Vec<f64>> {
        self.group_totals()
            .iter()
            .enumerate()
            .map(|(col, &total)| {
                self.counts
                    .iter()
                    .map(|row| {
                        if total == 0 {
                            0.0
                        } else {
                            row[col] as f64 / total as f64 * 100.0
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Pearson chi-square test of independence.
    ///
    /// Returns (statistic, degrees of freedom, p-value). The continuity
    /// correction only ever applies to tables with one degree of freedom.
    pub fn chi_square(&self, yates: bool) -> Result<(f64, usize, f64), AnalysisError> {
        let rows = self.outcome_categories.len();
        let cols = self.group_categories.len();
        if rows < 2 {
            return Err(AnalysisError::variation(
                "outcome has fewer than 2 distinct values",
            ));
        }
        if cols < 2 {
            return Err(AnalysisError::variation(
                "grouping field has fewer than 2 distinct values",
            ));
        }

        let n = self.total() as f64;
        let outcome_totals = self.outcome_totals();
        let group_totals = self.group_totals();
        let dof = (rows - 1) * (cols - 1);
        let correct = yates && dof == 1;

        let mut statistic = 0.0;
        for (i, row) in self.counts.iter().enumerate() {
            for (j, &observed) in row.iter().enumerate() {
                let expected = outcome_totals[i] as f64 * group_totals[j] as f64 / n;
                if !(expected > 0.0) {
                    return Err(AnalysisError::variation(format!(
                        "expected frequency is zero for {} x {}",
                        self.outcome_categories[i], self.group_categories[j]
                    )));
                }
                let mut diff = (observed as f64 - expected).abs();
                if correct {
                    diff = (diff - 0.5).max(0.0);
                }
                statistic += diff * diff / expected;
            }
        }

        let dist = ChiSquared::new(dof as f64)
            .map_err(|e| AnalysisError::variation(format!("chi-square distribution: {e}")))?;
        let p_value = dist.sf(statistic);

        if !statistic.is_finite() || !p_value.is_finite() {
            return Err(AnalysisError::variation("chi-square is not finite"));
        }
        Ok((statistic, dof, p_value))
    }
}

/// Cross-tabulation of one outcome field against one grouping field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContingencyResult {
    pub outcome_field: String,
    pub group_field: String,
    #[serde(flatten)]
    pub table: CountTable,
    /// Percent of each group category falling in each outcome, `[group][outcome]`.
    pub row_percentages: Vec<Vec<f64>>,
    /// Rows with a value in both fields.
    pub sample_size: u64,
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub cramers_v: f64,
    pub concern: Concern,
    pub effect_size: EffectSize,
    pub yates_corrected: bool,
}

impl ContingencyResult {
    pub fn count(&self, outcome: &str, group: &str) -> Option<u64> {
        let row = self.table.outcome_categories.iter().position(|c| c == outcome)?;
        let col = self.table.group_categories.iter().position(|c| c == group)?;
        Some(self.table.counts[row][col])
    }

    pub fn row_percentage(&self, group: &str, outcome: &str) -> Option<f64> {
        let row = self.table.group_categories.iter().position(|c| c == group)?;
        let col = self.table.outcome_categories.iter().position(|c| c == outcome)?;
        Some(self.row_percentages[row][col])
    }

    pub fn is_significant(&self) -> bool {
        self.concern != Concern::Low
    }

    /// Most frequent (outcome, group) cell; first-seen wins ties.
    pub fn peak_cell(&self) -> Option<(&str, &str, u64)> {
        let mut best: Option<(&str, &str, u64)> = None;
        for (i, row) in self.table.counts.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                if best.map_or(true, |(_, _, c)| count > c) {
                    best = Some((
                        self.table.outcome_categories[i].as_str(),
                        self.table.group_categories[j].as_str(),
                        count,
                    ));
                }
            }
        }
        best
    }

    /// (group, outcome, percent) cells whose row percentage exceeds `threshold`.
    pub fn high_share_cells(&self, threshold: f64) -> Vec<(&str, &str, f64)> {
        let mut cells = Vec::new();
        for (g, row) in self.row_percentages.iter().enumerate() {
            for (o, &pct) in row.iter().enumerate() {
                if pct > threshold {
                    cells.push((
                        self.table.group_categories[g].as_str(),
                        self.table.outcome_categories[o].as_str(),
                        pct,
                    ));
                }
            }
        }
        cells
    }
}

/// Result of one outcome x independent pair within an indicator set.
#[derive(Debug)]
pub struct IndicatorCrossTab {
    pub outcome: &'static str,
    pub group: &'static str,
    pub result: Result<ContingencyResult, AnalysisError>,
}

/// Number of pairs per concern level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConcernTally {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub failed: usize,
}

/// Computes cross-tabulations over a survey dataset.
pub struct CrossTabulator;

impl CrossTabulator {
    /// Cross-tabulate `outcome` against `group`; rows missing either value are skipped.
    pub fn cross_tab(
        dataset: &SurveyDataset,
        outcome: &str,
        group: &str,
        config: &EngineConfig,
    ) -> Result<ContingencyResult, AnalysisError> {
        let outcomes = dataset.labels(outcome)?;
        let groups = dataset.labels(group)?;

        let table = CountTable::from_pairs(
            outcomes
                .iter()
                .zip(groups.iter())
                .filter_map(|(o, g)| Some((o.as_deref()?, g.as_deref()?))),
        );

        debug!(
            "cross_tab {} x {}: {} paired rows, {}x{} table",
            outcome,
            group,
            table.total(),
            table.outcome_categories.len(),
            table.group_categories.len()
        );

        Self::from_table(outcome, group, table, config)
    }

    /// Derive statistics for an already-tallied table.
    pub fn from_table(
        outcome: &str,
        group: &str,
        table: CountTable,
        config: &EngineConfig,
    ) -> Result<ContingencyResult, AnalysisError> {
        let sample_size = table.total();
        if sample_size == 0 {
            return Err(AnalysisError::variation(format!(
                "no rows have values for both {outcome} and {group}"
            )));
        }

        let (chi_square, degrees_of_freedom, p_value) = table.chi_square(config.yates_correction)?;

        let k = (table.outcome_categories.len() - 1).min(table.group_categories.len() - 1);
        if k == 0 {
            return Err(AnalysisError::variation("Cramér's V is undefined"));
        }
        let cramers_v = (chi_square / (sample_size as f64 * k as f64)).sqrt();
        if !cramers_v.is_finite() {
            return Err(AnalysisError::variation("Cramér's V is not finite"));
        }

        Ok(ContingencyResult {
            outcome_field: outcome.to_string(),
            group_field: group.to_string(),
            row_percentages: table.row_percentages(),
            table,
            sample_size,
            chi_square,
            degrees_of_freedom,
            p_value,
            cramers_v,
            concern: Concern::classify(p_value, &config.concern),
            effect_size: EffectSize::classify(cramers_v, &config.effect_size),
            yates_corrected: config.yates_correction && degrees_of_freedom == 1,
        })
    }

    /// Every outcome x independent pair of an indicator set, computed in parallel.
    pub fn cross_tab_indicator(
        dataset: &SurveyDataset,
        indicator_id: u8,
        config: &EngineConfig,
    ) -> Result<Vec<IndicatorCrossTab>, AnalysisError> {
        let set = indicators::indicator_set(indicator_id)?;
        let pairs: Vec<(&'static str, &'static str)> = set
            .outcomes
            .iter()
            .flat_map(|o| set.independents.iter().map(move |g| (*o, *g)))
            .collect();

        Ok(pairs
            .par_iter()
            .map(|&(outcome, group)| IndicatorCrossTab {
                outcome,
                group,
                result: Self::cross_tab(dataset, outcome, group, config),
            })
            .collect())
    }

    pub fn concern_tally(results: &[IndicatorCrossTab]) -> ConcernTally {
        let mut tally = ConcernTally::default();
        for entry in results {
            match &entry.result {
                Ok(r) => match r.concern {
                    Concern::High => tally.high += 1,
                    Concern::Medium => tally.medium += 1,
                    Concern::Low => tally.low += 1,
                },
                Err(_) => tally.failed += 1,
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLoader, DatasetVersion};
    use polars::prelude::*;
    use proptest::prelude::*;

    fn dataset(columns: Vec<Column>) -> SurveyDataset {
        let df = DataFrame::new(columns).unwrap();
        DataLoader::from_frame(df, DatasetVersion::of_bytes(b"crosstab"), &EngineConfig::default())
            .unwrap()
    }

    fn setting_disrupted() -> SurveyDataset {
        dataset(vec![
            Column::new(
                "Setting".into(),
                vec!["A", "A", "A", "B", "B", "B", "B", "A", "B", "A"],
            ),
            Column::new(
                "Disrupted".into(),
                vec!["Yes", "Yes", "No", "Yes", "No", "No", "No", "No", "Yes", "No"],
            ),
        ])
    }

    #[test]
    fn balanced_table_has_no_association() {
        let ds = setting_disrupted();
        let r = CrossTabulator::cross_tab(&ds, "Disrupted", "Setting", &EngineConfig::default())
            .unwrap();

        assert_eq!(r.table.outcome_categories, vec!["Yes", "No"]);
        assert_eq!(r.table.group_categories, vec!["A", "B"]);
        assert_eq!(r.table.counts, vec![vec![2, 2], vec![3, 3]]);
        assert_eq!(r.count("Yes", "A"), Some(2));
        assert_eq!(r.count("No", "B"), Some(3));
        assert_eq!(r.row_percentage("A", "Yes"), Some(40.0));
        assert_eq!(r.row_percentage("A", "No"), Some(60.0));
        assert_eq!(r.row_percentage("B", "Yes"), Some(40.0));
        assert_eq!(r.row_percentage("B", "No"), Some(60.0));
        assert!(r.chi_square.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-9);
        assert!(r.cramers_v.abs() < 1e-9);
        assert_eq!(r.degrees_of_freedom, 1);
        assert_eq!(r.sample_size, 10);
        assert_eq!(r.concern, Concern::Low);
        assert_eq!(r.effect_size, EffectSize::Weak);
    }

    #[test]
    fn strong_association_is_high_concern() {
        let mut setting = vec!["A"; 30];
        setting.extend(vec!["B"; 30]);
        let mut disrupted = vec!["Yes"; 27];
        disrupted.extend(vec!["No"; 3]);
        disrupted.extend(vec!["Yes"; 3]);
        disrupted.extend(vec!["No"; 27]);
        let ds = dataset(vec![
            Column::new("Setting".into(), setting),
            Column::new("Disrupted".into(), disrupted),
        ]);

        let r = CrossTabulator::cross_tab(&ds, "Disrupted", "Setting", &EngineConfig::default())
            .unwrap();
        // (27-15)^2/15 * 4 = 38.4
        assert!((r.chi_square - 38.4).abs() < 1e-9);
        assert!(r.p_value < 0.01);
        assert!((r.cramers_v - 0.8).abs() < 1e-9);
        assert_eq!(r.concern, Concern::High);
        assert_eq!(r.effect_size, EffectSize::Strong);
        assert!(r.is_significant());
    }

    #[test]
    fn yates_correction_shrinks_two_by_two_statistic() {
        let table = CountTable {
            outcome_categories: vec!["Yes".into(), "No".into()],
            group_categories: vec!["A".into(), "B".into()],
            counts: vec![vec![27, 3], vec![3, 27]],
        };
        let (plain, _, _) = table.chi_square(false).unwrap();
        let (corrected, _, _) = table.chi_square(true).unwrap();
        // (11.5)^2/15 * 4
        assert!((corrected - 35.266_666_666_666_67).abs() < 1e-9);
        assert!(corrected < plain);
    }

    #[test]
    fn single_group_is_insufficient_variation() {
        let ds = dataset(vec![
            Column::new("Setting".into(), vec!["A"; 4]),
            Column::new("Disrupted".into(), vec!["Yes", "No", "Yes", "No"]),
        ]);
        let err = CrossTabulator::cross_tab(&ds, "Disrupted", "Setting", &EngineConfig::default());
        assert!(matches!(err, Err(AnalysisError::InsufficientVariation(_))));
    }

    #[test]
    fn missing_values_are_not_a_category() {
        let ds = dataset(vec![
            Column::new(
                "Setting".into(),
                vec![Some("A"), None, Some("B"), Some("A"), Some("B")],
            ),
            Column::new(
                "Disrupted".into(),
                vec![Some("Yes"), Some("No"), None, Some("No"), Some("Yes")],
            ),
        ]);
        let r = CrossTabulator::cross_tab(&ds, "Disrupted", "Setting", &EngineConfig::default())
            .unwrap();
        assert_eq!(r.sample_size, 3);
        assert_eq!(r.table.outcome_categories, vec!["Yes", "No"]);
        assert_eq!(r.table.group_categories, vec!["A", "B"]);
    }

    #[test]
    fn unknown_field_is_missing_field() {
        let ds = setting_disrupted();
        let err = CrossTabulator::cross_tab(&ds, "Nope", "Setting", &EngineConfig::default());
        assert!(matches!(err, Err(AnalysisError::MissingField(_))));
    }

    #[test]
    fn concern_thresholds_come_from_config() {
        let thresholds = ConcernThresholds {
            high_p: 0.001,
            medium_p: 0.1,
        };
        assert_eq!(Concern::classify(0.005, &thresholds), Concern::Medium);
        assert_eq!(Concern::classify(0.0005, &thresholds), Concern::High);
        assert_eq!(Concern::classify(0.2, &thresholds), Concern::Low);
    }

    #[test]
    fn peak_and_high_share_cells() {
        let ds = setting_disrupted();
        let r = CrossTabulator::cross_tab(&ds, "Disrupted", "Setting", &EngineConfig::default())
            .unwrap();
        assert_eq!(r.peak_cell(), Some(("No", "A", 3)));
        assert_eq!(r.high_share_cells(50.0), vec![("A", "No", 60.0), ("B", "No", 60.0)]);
    }

    #[test]
    fn unknown_indicator_set_is_rejected() {
        let ds = setting_disrupted();
        let err = CrossTabulator::cross_tab_indicator(&ds, 9, &EngineConfig::default());
        assert!(matches!(err, Err(AnalysisError::UnknownIndicatorSet(9))));
    }

    proptest! {
        #[test]
        fn counts_cover_paired_rows_and_percentages_sum_to_100(
            rows in proptest::collection::vec(
                (proptest::option::of(0u8..4), proptest::option::of(0u8..3)),
                1..200,
            )
        ) {
            let outcome: Vec<Option<String>> = rows.iter().map(|(o, _)| o.map(|v| format!("o{v}"))).collect();
            let group: Vec<Option<String>> = rows.iter().map(|(_, g)| g.map(|v| format!("g{v}"))).collect();
            let paired = rows.iter().filter(|(o, g)| o.is_some() && g.is_some()).count() as u64;

            let table = CountTable::from_pairs(
                outcome.iter().zip(group.iter()).filter_map(|(o, g)| Some((o.as_deref()?, g.as_deref()?))),
            );
            prop_assert_eq!(table.total(), paired);
            prop_assert_eq!(table.counts.len(), table.outcome_categories.len());

            for row in table.row_percentages() {
                let sum: f64 = row.iter().sum();
                prop_assert!((sum - 100.0).abs() < 1e-6);
            }

            match CrossTabulator::from_table("o", "g", table.clone(), &EngineConfig::default()) {
                Ok(r) => {
                    prop_assert!(r.chi_square.is_finite() && r.chi_square >= 0.0);
                    prop_assert!((0.0..=1.0).contains(&r.p_value));
                    let again = CrossTabulator::from_table("o", "g", table, &EngineConfig::default()).unwrap();
                    prop_assert_eq!(r, again);
                }
                Err(e) => prop_assert!(matches!(e, AnalysisError::InsufficientVariation(_))),
            }
        }
    }
}
