//! Export Module
//! Delimited-text downloads of analysis results, and re-reading exported counts.

use crate::error::ExportError;
use crate::stats::{ContingencyResult, CountTable, GroupRate, SummaryResult};
use log::debug;
use polars::prelude::*;
use std::io::Cursor;

pub const OUTCOME_COLUMN: &str = "outcome_category";
pub const GROUP_COLUMN: &str = "group_category";
pub const COUNT_COLUMN: &str = "count";
pub const PERCENT_COLUMN: &str = "row_percentage";

fn write_delimited(mut df: DataFrame, delimiter: u8) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(delimiter)
        .finish(&mut df)?;
    Ok(String::from_utf8(buf)?)
}

/// One row per (outcome, group) cell, zero counts included, outcome-major.
pub fn contingency_to_delimited(
    result: &ContingencyResult,
    delimiter: u8,
) -> Result<String, ExportError> {
    let table = &result.table;
    let cells = table.outcome_categories.len() * table.group_categories.len();
    let mut outcomes = Vec::with_capacity(cells);
    let mut groups = Vec::with_capacity(cells);
    let mut counts = Vec::with_capacity(cells);
    let mut percentages = Vec::with_capacity(cells);

    for (o, outcome) in table.outcome_categories.iter().enumerate() {
        for (g, group) in table.group_categories.iter().enumerate() {
            outcomes.push(outcome.as_str());
            groups.push(group.as_str());
            counts.push(table.counts[o][g]);
            percentages.push(result.row_percentages[g][o]);
        }
    }

    let df = DataFrame::new(vec![
        Column::new(OUTCOME_COLUMN.into(), outcomes),
        Column::new(GROUP_COLUMN.into(), groups),
        Column::new(COUNT_COLUMN.into(), counts),
        Column::new(PERCENT_COLUMN.into(), percentages),
    ])?;
    debug!(
        "export {} x {}: {} cells",
        result.outcome_field, result.group_field, cells
    );
    write_delimited(df, delimiter)
}

/// Test statistics of a cross-tabulation as `statistic,value` rows.
pub fn statistics_to_delimited(
    result: &ContingencyResult,
    delimiter: u8,
) -> Result<String, ExportError> {
    let rows: [(&str, String); 10] = [
        ("outcome_field", result.outcome_field.clone()),
        ("group_field", result.group_field.clone()),
        ("sample_size", result.sample_size.to_string()),
        ("chi_square", result.chi_square.to_string()),
        ("degrees_of_freedom", result.degrees_of_freedom.to_string()),
        ("p_value", result.p_value.to_string()),
        ("cramers_v", result.cramers_v.to_string()),
        ("concern", format!("{:?}", result.concern)),
        ("effect_size", format!("{:?}", result.effect_size)),
        ("yates_corrected", result.yates_corrected.to_string()),
    ];

    let df = DataFrame::new(vec![
        Column::new(
            "statistic".into(),
            rows.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        ),
        Column::new(
            "value".into(),
            rows.iter().map(|(_, value)| value.as_str()).collect::<Vec<_>>(),
        ),
    ])?;
    write_delimited(df, delimiter)
}

/// Group counts of a summary; a summary without a group field exports one `All` row.
pub fn summary_to_delimited(
    summary: &SummaryResult,
    delimiter: u8,
) -> Result<String, ExportError> {
    let (labels, counts, percentages): (Vec<String>, Vec<u64>, Vec<f64>) = match &summary.groups {
        Some(groups) => (
            groups.iter().map(|g| g.label.clone()).collect(),
            groups.iter().map(|g| g.count).collect(),
            groups.iter().map(|g| g.percentage).collect(),
        ),
        None => {
            let share = if summary.total_rows == 0 {
                0.0
            } else {
                summary.filtered_rows as f64 / summary.total_rows as f64 * 100.0
            };
            (
                vec!["All".to_string()],
                vec![summary.filtered_rows as u64],
                vec![share],
            )
        }
    };

    let df = DataFrame::new(vec![
        Column::new("category".into(), labels),
        Column::new(COUNT_COLUMN.into(), counts),
        Column::new("percentage".into(), percentages),
    ])?;
    write_delimited(df, delimiter)
}

/// One row per (group, field) rate, in the order given.
pub fn group_rates_to_delimited(rates: &[GroupRate], delimiter: u8) -> Result<String, ExportError> {
    let df = DataFrame::new(vec![
        Column::new(
            "group".into(),
            rates.iter().map(|r| r.group.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "field".into(),
            rates.iter().map(|r| r.field.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "positives".into(),
            rates.iter().map(|r| r.positives).collect::<Vec<_>>(),
        ),
        Column::new(
            "total".into(),
            rates.iter().map(|r| r.total).collect::<Vec<_>>(),
        ),
        Column::new(
            "rate".into(),
            rates.iter().map(|r| r.rate).collect::<Vec<_>>(),
        ),
    ])?;
    write_delimited(df, delimiter)
}

fn text_column<'a>(df: &'a DataFrame, name: &'static str) -> Result<&'a StringChunked, ExportError> {
    let column = df.column(name).map_err(|_| ExportError::MissingColumn(name))?;
    Ok(column.as_materialized_series().str()?)
}

/// Rebuild the count matrix from [`contingency_to_delimited`] output.
///
/// Categories come back in the order they first appear in the text.
pub fn parse_counts(text: &str, delimiter: u8) -> Result<CountTable, ExportError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_separator(delimiter))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
        .finish()?;

    let outcomes = text_column(&df, OUTCOME_COLUMN)?;
    let groups = text_column(&df, GROUP_COLUMN)?;
    let counts = text_column(&df, COUNT_COLUMN)?;

    let mut table = CountTable::default();
    for (idx, ((outcome, group), count)) in outcomes
        .into_iter()
        .zip(groups.into_iter())
        .zip(counts.into_iter())
        .enumerate()
    {
        let raw = count.unwrap_or_default();
        let count: u64 = raw.trim().parse().map_err(|_| ExportError::InvalidCount {
            line: idx + 2,
            value: raw.to_string(),
        })?;
        table.add(outcome.unwrap_or_default(), group.unwrap_or_default(), count);
    }
    Ok(table)
}
