//! Survey Dataset Module
//! Complete responses held in a Polars DataFrame, with a schema typed at load time.

use crate::error::AnalysisError;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;

/// How a field is analysed, decided once when the dataset is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    /// Text answers (roles, Likert labels, ...).
    Categorical,
    /// Numeric columns whose values are all 0 or 1, or boolean columns.
    Binary,
    /// Any other numeric column.
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered list of the fields present in a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SurveySchema {
    fields: Vec<FieldSpec>,
}

impl SurveySchema {
    /// Infer field kinds from DataFrame dtypes and values.
    pub fn infer(df: &DataFrame) -> PolarsResult<Self> {
        let fields = df
            .get_columns()
            .iter()
            .map(|column| {
                Ok(FieldSpec {
                    name: column.name().to_string(),
                    kind: infer_kind(column)?,
                })
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up a field, surfacing unknown names as `MissingField`.
    pub fn require(&self, name: &str) -> Result<&FieldSpec, AnalysisError> {
        self.get(name)
            .ok_or_else(|| AnalysisError::MissingField(name.to_string()))
    }

    /// Names of every field of the given kind, in column order.
    pub fn names_of_kind(&self, kind: FieldKind) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// Content hash identifying the bytes a dataset was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DatasetVersion(String);

impl DatasetVersion {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Complete survey responses for one session. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct SurveyDataset {
    df: DataFrame,
    schema: SurveySchema,
    version: DatasetVersion,
    submitted: usize,
}

impl SurveyDataset {
    /// Wrap an already-filtered frame. `submitted` is the row count before filtering.
    pub(crate) fn new(
        df: DataFrame,
        version: DatasetVersion,
        submitted: usize,
    ) -> PolarsResult<Self> {
        let schema = SurveySchema::infer(&df)?;
        Ok(Self {
            df,
            schema,
            version,
            submitted,
        })
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn schema(&self) -> &SurveySchema {
        &self.schema
    }

    pub fn version(&self) -> &DatasetVersion {
        &self.version
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Responses in the source before incomplete ones were dropped.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Responses dropped at load time because they were incomplete.
    pub fn excluded(&self) -> usize {
        self.submitted.saturating_sub(self.df.height())
    }

    pub fn completion_rate(&self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            self.df.height() as f64 / self.submitted as f64 * 100.0
        }
    }

    fn column(&self, field: &str) -> Result<&Column, AnalysisError> {
        self.schema.require(field)?;
        Ok(self.df.column(field)?)
    }

    /// Category label of every row, `None` where the value is missing.
    pub fn labels(&self, field: &str) -> Result<Vec<Option<String>>, AnalysisError> {
        let column = self.column(field)?;

        let labels = match column.dtype() {
            DataType::String => column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|v| v.and_then(clean_text))
                .collect(),
            dtype if is_numeric(dtype) => {
                let values = column.cast(&DataType::Float64)?;
                values
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()).map(format_number))
                    .collect()
            }
            _ => (0..column.len())
                .map(|i| column.get(i).ok().and_then(|v| any_label(&v)))
                .collect(),
        };

        Ok(labels)
    }

    /// Numeric value of every row; text that does not parse counts as missing.
    pub fn numbers(&self, field: &str) -> Result<Vec<Option<f64>>, AnalysisError> {
        let column = self.column(field)?;
        let values = column.cast(&DataType::Float64)?;
        Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect())
    }

    /// Yes/no reading of every row: numeric non-zero, or `yes`/`true` text.
    pub fn flags(&self, field: &str) -> Result<Vec<Option<bool>>, AnalysisError> {
        let column = self.column(field)?;

        if matches!(column.dtype(), DataType::String) {
            return Ok(self
                .labels(field)?
                .into_iter()
                .map(|label| label.and_then(|l| parse_flag(&l)))
                .collect());
        }

        Ok(self
            .numbers(field)?
            .into_iter()
            .map(|v| v.map(|x| x != 0.0))
            .collect())
    }

    /// Number of rows with no value in `field`.
    pub fn missing_count(&self, field: &str) -> Result<usize, AnalysisError> {
        Ok(self.labels(field)?.iter().filter(|v| v.is_none()).count())
    }

    /// Distinct non-missing labels in first-seen order.
    pub fn unique_labels(&self, field: &str) -> Result<Vec<String>, AnalysisError> {
        let mut seen: Vec<String> = Vec::new();
        for label in self.labels(field)?.into_iter().flatten() {
            if !seen.contains(&label) {
                seen.push(label);
            }
        }
        Ok(seen)
    }

    /// Rows where `keep` is true. Schema, version and load counts carry over.
    pub fn subset(&self, keep: &[bool]) -> Result<SurveyDataset, AnalysisError> {
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        let df = self.df.filter(&mask)?;
        Ok(Self {
            df,
            schema: self.schema.clone(),
            version: self.version.clone(),
            submitted: self.submitted,
        })
    }
}

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn infer_kind(column: &Column) -> PolarsResult<FieldKind> {
    if matches!(column.dtype(), DataType::Boolean) {
        return Ok(FieldKind::Binary);
    }
    if !is_numeric(column.dtype()) {
        return Ok(FieldKind::Categorical);
    }

    let values = column.cast(&DataType::Float64)?;
    let mut any = false;
    let mut binary = true;
    for v in values.f64()?.into_iter().flatten() {
        any = true;
        if v != 0.0 && v != 1.0 {
            binary = false;
            break;
        }
    }

    Ok(if any && binary {
        FieldKind::Binary
    } else {
        FieldKind::Numeric
    })
}

fn clean_text(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whole numbers print without a fractional part so `1.0` and `1` share a category.
pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

fn any_label(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => clean_text(s),
        AnyValue::StringOwned(s) => clean_text(s.as_str()),
        other => clean_text(&other.to_string()),
    }
}

fn parse_flag(label: &str) -> Option<bool> {
    match label.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "y" => Some(true),
        "no" | "false" | "0" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> SurveyDataset {
        let df = DataFrame::new(vec![
            Column::new("Role".into(), vec![Some("Physician"), None, Some(" Nurse "), Some("")]),
            Column::new("Flag".into(), vec![Some(1i64), Some(0), None, Some(1)]),
            Column::new("Score".into(), vec![Some(2.5f64), Some(3.0), Some(1.0), None]),
        ])
        .unwrap();
        SurveyDataset::new(df, DatasetVersion::of_bytes(b"test"), 6).unwrap()
    }

    #[test]
    fn infers_field_kinds() {
        let ds = dataset();
        let kinds: Vec<FieldKind> = ds.schema().fields().iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FieldKind::Categorical, FieldKind::Binary, FieldKind::Numeric]
        );
    }

    #[test]
    fn labels_trim_and_treat_blank_as_missing() {
        let ds = dataset();
        assert_eq!(
            ds.labels("Role").unwrap(),
            vec![Some("Physician".to_string()), None, Some("Nurse".to_string()), None]
        );
        assert_eq!(
            ds.labels("Score").unwrap(),
            vec![
                Some("2.5".to_string()),
                Some("3".to_string()),
                Some("1".to_string()),
                None
            ]
        );
    }

    #[test]
    fn unknown_field_is_missing_field() {
        let ds = dataset();
        assert!(matches!(
            ds.labels("Nope"),
            Err(AnalysisError::MissingField(name)) if name == "Nope"
        ));
    }

    #[test]
    fn flags_read_numeric_values() {
        let ds = dataset();
        assert_eq!(
            ds.flags("Flag").unwrap(),
            vec![Some(true), Some(false), None, Some(true)]
        );
    }

    #[test]
    fn subset_keeps_load_statistics() {
        let ds = dataset();
        let sub = ds.subset(&[true, false, true, false]).unwrap();
        assert_eq!(sub.height(), 2);
        assert_eq!(sub.submitted(), 6);
        assert_eq!(sub.version(), ds.version());
        assert_eq!(ds.excluded(), 2);
    }
}
