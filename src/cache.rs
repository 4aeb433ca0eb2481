//! Analysis Cache Module
//! Memoized cross-tabulations keyed by dataset version, field pair and filters.

use crate::data::{DatasetVersion, FilterCriteria};
use crate::stats::ContingencyResult;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub version: DatasetVersion,
    pub outcome: String,
    pub group: String,
    pub filters: FilterCriteria,
}

impl CacheKey {
    pub fn new(
        version: &DatasetVersion,
        outcome: &str,
        group: &str,
        filters: &FilterCriteria,
    ) -> Self {
        Self {
            version: version.clone(),
            outcome: outcome.to_string(),
            group: group.to_string(),
            filters: filters.clone(),
        }
    }
}

/// Successful cross-tabulations only; failures are recomputed on request.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<CacheKey, ContingencyResult>,
    hits: u64,
    misses: u64,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<&ContingencyResult> {
        match self.entries.get(key) {
            Some(result) => {
                self.hits += 1;
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, result: ContingencyResult) {
        self.entries.insert(key, result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::stats::{CountTable, CrossTabulator};

    fn result() -> ContingencyResult {
        let table = CountTable::from_pairs([("Yes", "A"), ("No", "B"), ("Yes", "A"), ("No", "B")]);
        CrossTabulator::from_table("Outcome", "Group", table, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn keys_differ_by_filters_and_version() {
        let v1 = DatasetVersion::of_bytes(b"one");
        let v2 = DatasetVersion::of_bytes(b"two");
        let none = FilterCriteria::new();
        let nurses = FilterCriteria::new().with("Role", ["Nurse"]);

        let mut cache = AnalysisCache::new();
        cache.insert(CacheKey::new(&v1, "Outcome", "Group", &none), result());

        assert!(cache.get(&CacheKey::new(&v1, "Outcome", "Group", &none)).is_some());
        assert!(cache.get(&CacheKey::new(&v1, "Outcome", "Group", &nurses)).is_none());
        assert!(cache.get(&CacheKey::new(&v2, "Outcome", "Group", &none)).is_none());
        assert!(cache.get(&CacheKey::new(&v1, "Group", "Outcome", &none)).is_none());
        assert_eq!(cache.stats(), (1, 3));

        cache.clear();
        assert!(cache.is_empty());
    }
}
