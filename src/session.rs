//! Analysis Session Module
//! One loaded dataset with its configuration and memoized cross-tabulations.

use crate::cache::{AnalysisCache, CacheKey};
use crate::config::EngineConfig;
use crate::data::{DataLoader, DataSource, FilterCriteria, SurveyDataset};
use crate::error::{AnalysisError, LoadError};
use crate::indicators;
use crate::stats::{
    ConcernTally, ContingencyResult, CorrelationEngine, CorrelationMatrix, CrossTabulator,
    DescriptiveStats, FieldCompleteness, GroupRate, OutcomeSummary, Overview, SummaryEngine,
    SummaryResult,
};
use log::{info, warn};
use serde::Serialize;

/// Outcome x independent pair of an indicator set that could not be tested.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedPair {
    pub outcome: &'static str,
    pub group: &'static str,
    pub reason: String,
}

/// Prevalence and association tests for one indicator set.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorReport {
    pub id: u8,
    pub title: &'static str,
    pub question: &'static str,
    pub outcomes: Vec<OutcomeSummary>,
    pub tally: ConcernTally,
    /// Medium or high concern pairs, smallest p-value first.
    pub significant: Vec<ContingencyResult>,
    pub skipped: Vec<SkippedPair>,
}

/// Yes/no rates compared across the categories of one field.
#[derive(Debug, Clone, Serialize)]
pub struct RateComparison {
    pub group_field: String,
    pub filters: String,
    pub rates: Vec<GroupRate>,
    pub highest: Option<GroupRate>,
    pub lowest: Option<GroupRate>,
}

/// Holds the active dataset. Independent of every other session.
#[derive(Debug)]
pub struct Session {
    dataset: SurveyDataset,
    config: EngineConfig,
    cache: AnalysisCache,
}

impl Session {
    pub fn new(source: &DataSource, config: EngineConfig) -> Result<Self, LoadError> {
        let dataset = DataLoader::load(source, &config)?;
        info!(
            "session opened: dataset {} with {} complete responses",
            dataset.version(),
            dataset.height()
        );
        Ok(Self {
            dataset,
            config,
            cache: AnalysisCache::new(),
        })
    }

    /// Load `source`, falling back to the bundled sample if it cannot be loaded.
    pub fn open_or_sample(source: &DataSource, config: EngineConfig) -> Result<Self, LoadError> {
        match DataLoader::load(source, &config) {
            Ok(dataset) => {
                info!("session opened: dataset {}", dataset.version());
                Ok(Self {
                    dataset,
                    config,
                    cache: AnalysisCache::new(),
                })
            }
            Err(err) => {
                warn!("failed to load upload ({}), using sample data", err);
                Self::new(&DataSource::Sample, config)
            }
        }
    }

    /// Swap in a new dataset and drop every cached result.
    ///
    /// On failure the current dataset stays active.
    pub fn replace(&mut self, source: &DataSource) -> Result<(), LoadError> {
        let dataset = DataLoader::load(source, &self.config)?;
        info!(
            "dataset replaced: {} -> {} ({} cached results dropped)",
            self.dataset.version(),
            dataset.version(),
            self.cache.len()
        );
        self.dataset = dataset;
        self.cache.clear();
        Ok(())
    }

    pub fn dataset(&self) -> &SurveyDataset {
        &self.dataset
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Cross-tabulate within the rows passing `filters`; repeated calls hit the cache.
    pub fn cross_tab(
        &mut self,
        outcome: &str,
        group: &str,
        filters: &FilterCriteria,
    ) -> Result<ContingencyResult, AnalysisError> {
        let key = CacheKey::new(self.dataset.version(), outcome, group, filters);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let filtered = filters.apply(&self.dataset)?;
        let result = CrossTabulator::cross_tab(&filtered, outcome, group, &self.config)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    pub fn summarize(
        &self,
        filters: &FilterCriteria,
        group_field: Option<&str>,
    ) -> Result<SummaryResult, AnalysisError> {
        SummaryEngine::summarize(&self.dataset, filters, group_field)
    }

    /// Headline numbers, ranking the disruption outcomes of indicator set 1.
    pub fn overview(&self) -> Result<Overview, AnalysisError> {
        let set = indicators::indicator_set(1)?;
        SummaryEngine::overview(&self.dataset, &self.config, set.outcomes)
    }

    pub fn indicator(&self, id: u8) -> Result<IndicatorReport, AnalysisError> {
        let set = indicators::indicator_set(id)?;
        let outcomes = DescriptiveStats::describe_indicator_set(&self.dataset, id, &self.config)?;
        let pairs = CrossTabulator::cross_tab_indicator(&self.dataset, id, &self.config)?;
        let tally = CrossTabulator::concern_tally(&pairs);

        let mut significant = Vec::new();
        let mut skipped = Vec::new();
        for pair in pairs {
            match pair.result {
                Ok(result) if result.is_significant() => significant.push(result),
                Ok(_) => {}
                Err(err) => skipped.push(SkippedPair {
                    outcome: pair.outcome,
                    group: pair.group,
                    reason: err.to_string(),
                }),
            }
        }
        significant.sort_by(|a, b| {
            a.p_value
                .partial_cmp(&b.p_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(IndicatorReport {
            id,
            title: set.title,
            question: set.question,
            outcomes,
            tally,
            significant,
            skipped,
        })
    }

    /// Rates of `fields` per category of `group_field`, within the rows passing `filters`.
    pub fn compare<S: AsRef<str>>(
        &self,
        fields: &[S],
        group_field: &str,
        filters: &FilterCriteria,
    ) -> Result<RateComparison, AnalysisError> {
        let filtered = filters.apply(&self.dataset)?;
        let rates = SummaryEngine::group_rates(&filtered, fields, group_field)?;
        Ok(RateComparison {
            group_field: group_field.to_string(),
            filters: filters.describe(),
            highest: SummaryEngine::highest_rate(&rates).cloned(),
            lowest: SummaryEngine::lowest_rate(&rates).cloned(),
            rates,
        })
    }

    pub fn correlate<S: AsRef<str>>(&self, fields: &[S]) -> Result<CorrelationMatrix, AnalysisError> {
        CorrelationEngine::correlation_matrix(&self.dataset, fields)
    }

    pub fn completeness(&self) -> Result<Vec<FieldCompleteness>, AnalysisError> {
        DescriptiveStats::completeness_report(&self.dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(text: &str) -> DataSource {
        DataSource::Upload {
            file_name: "survey.csv".to_string(),
            bytes: text.as_bytes().to_vec(),
        }
    }

    const SURVEY: &str = "Progress,Role,Setting,Disrupted\n\
        100,Nurse,Clinic,Yes\n\
        100,Nurse,Clinic,Yes\n\
        100,Physician,Hospital,No\n\
        100,Physician,Hospital,No\n\
        100,Nurse,Clinic,No\n\
        100,Physician,Hospital,Yes\n\
        50,Nurse,Clinic,Yes\n";

    #[test]
    fn repeated_cross_tab_is_idempotent() {
        let mut session = Session::new(&upload(SURVEY), EngineConfig::default()).unwrap();
        let filters = FilterCriteria::new();
        let first = session.cross_tab("Disrupted", "Setting", &filters).unwrap();
        let second = session.cross_tab("Disrupted", "Setting", &filters).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.cache().len(), 1);
        assert_eq!(session.cache().stats(), (1, 1));
        assert_eq!(first.sample_size, 6);
    }

    #[test]
    fn filtered_cross_tab_is_cached_separately() {
        let mut session = Session::new(&upload(SURVEY), EngineConfig::default()).unwrap();
        session
            .cross_tab("Disrupted", "Setting", &FilterCriteria::new())
            .unwrap();
        let nurses = FilterCriteria::new().with("Role", ["Nurse"]);
        // a single setting among nurses cannot be tested
        assert!(matches!(
            session.cross_tab("Disrupted", "Setting", &nurses),
            Err(AnalysisError::InsufficientVariation(_))
        ));
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn replace_clears_cache() {
        let mut session = Session::new(&upload(SURVEY), EngineConfig::default()).unwrap();
        let before = session.dataset().version().clone();
        session
            .cross_tab("Disrupted", "Setting", &FilterCriteria::new())
            .unwrap();

        session.replace(&DataSource::Sample).unwrap();
        assert!(session.cache().is_empty());
        assert_ne!(session.dataset().version(), &before);
        assert_eq!(session.dataset().height(), 526);
    }

    #[test]
    fn failed_replace_keeps_dataset() {
        let mut session = Session::new(&upload(SURVEY), EngineConfig::default()).unwrap();
        let err = session.replace(&upload("   \n"));
        assert!(matches!(err, Err(LoadError::MalformedInput(_))));
        assert_eq!(session.dataset().height(), 6);
    }

    #[test]
    fn unreadable_upload_falls_back_to_sample() {
        let source = DataSource::Upload {
            file_name: "survey.pdf".to_string(),
            bytes: b"%PDF".to_vec(),
        };
        let session = Session::open_or_sample(&source, EngineConfig::default()).unwrap();
        assert_eq!(session.dataset().height(), 526);
    }

    #[test]
    fn comparison_applies_filters() {
        let session = Session::new(&upload(SURVEY), EngineConfig::default()).unwrap();
        let all = session
            .compare(&["Disrupted"], "Setting", &FilterCriteria::new())
            .unwrap();
        assert_eq!(all.rates.len(), 2);
        // Clinic 2 of 3, Hospital 1 of 3
        assert_eq!(all.highest.unwrap().group, "Clinic");
        assert_eq!(all.lowest.unwrap().group, "Hospital");

        let nurses = FilterCriteria::new().with("Role", ["Nurse"]);
        let filtered = session.compare(&["Disrupted"], "Setting", &nurses).unwrap();
        assert_eq!(filtered.rates.len(), 1);
        assert_eq!((filtered.rates[0].positives, filtered.rates[0].total), (2, 3));
        assert_eq!(filtered.filters, "Role: Nurse");
    }

    #[test]
    fn indicator_report_tallies_every_pair() {
        let session = Session::new(&DataSource::Sample, EngineConfig::default()).unwrap();
        let report = session.indicator(4).unwrap();
        let tally = report.tally;
        assert_eq!(tally.high + tally.medium + tally.low + tally.failed, 4 * 5);
        assert_eq!(report.significant.len(), tally.high + tally.medium);
        assert_eq!(report.skipped.len(), tally.failed);
        assert!(report
            .significant
            .windows(2)
            .all(|w| w[0].p_value <= w[1].p_value));
    }
}
