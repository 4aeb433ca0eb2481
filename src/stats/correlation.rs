//! Correlation Module
//! Pairwise Pearson correlation between numeric-coded fields.

use crate::data::SurveyDataset;
use crate::error::AnalysisError;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationStrength {
    Weak,
    Medium,
    Strong,
}

impl CorrelationStrength {
    pub fn classify(r: f64) -> Self {
        let magnitude = r.abs();
        if magnitude > 0.5 {
            CorrelationStrength::Strong
        } else if magnitude > 0.3 {
            CorrelationStrength::Medium
        } else {
            CorrelationStrength::Weak
        }
    }
}

/// Symmetric matrix over `fields`; `None` marks pairs with no defined correlation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    fn index(&self, field: &str) -> Result<usize, AnalysisError> {
        self.fields
            .iter()
            .position(|f| f == field)
            .ok_or_else(|| AnalysisError::MissingField(field.to_string()))
    }

    /// Correlation of two fields, `InsufficientVariation` when undefined.
    pub fn get(&self, a: &str, b: &str) -> Result<f64, AnalysisError> {
        let (i, j) = (self.index(a)?, self.index(b)?);
        self.values[i][j].ok_or_else(|| {
            AnalysisError::variation(format!("correlation of {a} and {b} is undefined"))
        })
    }

    /// Defined off-diagonal pairs, strongest first.
    pub fn strongest_pairs(&self) -> Vec<(&str, &str, f64)> {
        let mut pairs = Vec::new();
        for i in 0..self.fields.len() {
            for j in (i + 1)..self.fields.len() {
                if let Some(r) = self.values[i][j] {
                    pairs.push((self.fields[i].as_str(), self.fields[j].as_str(), r));
                }
            }
        }
        pairs.sort_by(|a, b| {
            b.2.abs()
                .partial_cmp(&a.2.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs
    }
}

/// Computes correlations between numeric fields.
pub struct CorrelationEngine;

impl CorrelationEngine {
    /// Pearson correlation over rows where both values are present.
    ///
    /// Undefined when fewer than two such rows exist or either side is constant.
    pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Result<f64, AnalysisError> {
        let pairs: Vec<(f64, f64)> = x
            .iter()
            .zip(y.iter())
            .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
            .collect();

        let n = pairs.len();
        if n < 2 {
            return Err(AnalysisError::variation("fewer than 2 paired observations"));
        }

        let (x0, y0) = pairs[0];
        if pairs.iter().all(|(a, _)| *a == x0) || pairs.iter().all(|(_, b)| *b == y0) {
            return Err(AnalysisError::variation("field is constant"));
        }

        let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n as f64;
        let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n as f64;

        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for (a, b) in &pairs {
            let dx = a - mean_x;
            let dy = b - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }

        if var_x == 0.0 || var_y == 0.0 {
            return Err(AnalysisError::variation("field is constant"));
        }

        let r = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
        if r.is_finite() {
            Ok(r)
        } else {
            Err(AnalysisError::variation("correlation is not finite"))
        }
    }

    pub fn correlation_matrix<S: AsRef<str>>(
        dataset: &SurveyDataset,
        fields: &[S],
    ) -> Result<CorrelationMatrix, AnalysisError> {
        let columns = fields
            .iter()
            .map(|f| dataset.numbers(f.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let values: Vec<Vec<Option<f64>>> = (0..columns.len())
            .into_par_iter()
            .map(|i| {
                (0..columns.len())
                    .map(|j| Self::pearson(&columns[i], &columns[j]).ok())
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(CorrelationMatrix {
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::data::{DataLoader, DatasetVersion};
    use polars::prelude::*;

    fn dataset() -> SurveyDataset {
        let df = DataFrame::new(vec![
            Column::new("X".into(), vec![1.0f64, 2.0, 3.0, 4.0, 5.0]),
            Column::new("Double".into(), vec![2.0f64, 4.0, 6.0, 8.0, 10.0]),
            Column::new("Reverse".into(), vec![Some(5i64), Some(4), None, Some(2), Some(1)]),
            Column::new("Constant".into(), vec![1i64; 5]),
        ])
        .unwrap();
        DataLoader::from_frame(df, DatasetVersion::of_bytes(b"corr"), &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn perfect_correlations() {
        let ds = dataset();
        let m = CorrelationEngine::correlation_matrix(&ds, &["X", "Double", "Reverse"]).unwrap();
        assert!((m.get("X", "Double").unwrap() - 1.0).abs() < 1e-12);
        assert!((m.get("X", "Reverse").unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(m.get("Double", "X").unwrap(), m.get("X", "Double").unwrap());
        assert_eq!(
            CorrelationStrength::classify(m.get("X", "Reverse").unwrap()),
            CorrelationStrength::Strong
        );
    }

    #[test]
    fn constant_field_is_insufficient_variation() {
        let ds = dataset();
        let m = CorrelationEngine::correlation_matrix(&ds, &["X", "Constant"]).unwrap();
        assert!(matches!(
            m.get("X", "Constant"),
            Err(AnalysisError::InsufficientVariation(_))
        ));
        assert!(matches!(
            m.get("Constant", "Constant"),
            Err(AnalysisError::InsufficientVariation(_))
        ));
        assert!(m.get("X", "X").is_ok());
    }

    #[test]
    fn decimal_constant_is_insufficient_variation() {
        let y = [Some(1.0), Some(2.0), Some(4.0)];
        assert!(matches!(
            CorrelationEngine::pearson(&[Some(0.1); 3], &y),
            Err(AnalysisError::InsufficientVariation(_))
        ));

        let squares: Vec<Option<f64>> = (0..10).map(|i| Some((i * i) as f64)).collect();
        assert!(matches!(
            CorrelationEngine::pearson(&[Some(0.7); 10], &squares),
            Err(AnalysisError::InsufficientVariation(_))
        ));
        assert!(matches!(
            CorrelationEngine::pearson(&squares, &[Some(0.7); 10]),
            Err(AnalysisError::InsufficientVariation(_))
        ));
    }

    #[test]
    fn constant_after_dropping_missing_is_insufficient_variation() {
        let x = [Some(0.3), Some(0.3), None, Some(0.3)];
        let y = [Some(1.0), Some(2.0), Some(3.0), Some(5.0)];
        assert!(CorrelationEngine::pearson(&x, &y).is_err());
    }

    #[test]
    fn unknown_field_is_missing_field() {
        let ds = dataset();
        assert!(matches!(
            CorrelationEngine::correlation_matrix(&ds, &["X", "Nope"]),
            Err(AnalysisError::MissingField(_))
        ));
    }

    #[test]
    fn strongest_pairs_skip_undefined() {
        let ds = dataset();
        let m = CorrelationEngine::correlation_matrix(&ds, &["X", "Constant", "Double"]).unwrap();
        let pairs = m.strongest_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].0, pairs[0].1), ("X", "Double"));
    }
}
