//! Survey Data Loader Module
//! Decodes uploaded spreadsheets (CSV via Polars, Excel/ODS via calamine) or the
//! bundled sample, then keeps only complete responses.

use crate::config::EngineConfig;
use crate::data::dataset::{DatasetVersion, SurveyDataset};
use crate::data::sample;
use crate::error::LoadError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{debug, info};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

/// Where a dataset comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Raw bytes of an uploaded file; the extension selects the decoder.
    Upload { file_name: String, bytes: Vec<u8> },
    /// The bundled, seeded sample survey.
    Sample,
}

impl DataSource {
    /// Read a file from disk as an upload.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(DataSource::Upload { file_name, bytes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadFormat {
    Delimited(u8),
    Workbook,
}

fn malformed(err: impl ToString) -> LoadError {
    LoadError::MalformedInput(err.to_string())
}

/// Turns a data source into a `SurveyDataset` of complete responses.
pub struct DataLoader;

impl DataLoader {
    pub fn load(source: &DataSource, config: &EngineConfig) -> Result<SurveyDataset, LoadError> {
        match source {
            DataSource::Upload { file_name, bytes } => {
                let df = Self::read_upload(file_name, bytes)?;
                Self::from_frame(df, DatasetVersion::of_bytes(bytes), config)
            }
            DataSource::Sample => {
                let df = sample::sample_frame().map_err(malformed)?;
                Self::from_frame(df, DatasetVersion::of_bytes(sample::SAMPLE_TAG), config)
            }
        }
    }

    /// Build a dataset from an in-memory frame, applying the completion filter.
    pub fn from_frame(
        df: DataFrame,
        version: DatasetVersion,
        config: &EngineConfig,
    ) -> Result<SurveyDataset, LoadError> {
        if df.width() == 0 {
            return Err(LoadError::MalformedInput("no columns found".to_string()));
        }

        let submitted = df.height();
        let complete = Self::filter_complete(df, config)?;
        if complete.height() == 0 {
            return Err(LoadError::EmptyResult);
        }

        info!(
            "Loaded {} complete responses ({} excluded, {} fields, version {})",
            complete.height(),
            submitted - complete.height(),
            complete.width(),
            version
        );

        SurveyDataset::new(complete, version, submitted).map_err(malformed)
    }

    /// Keep rows whose completion value equals the target.
    ///
    /// Without a completion column every row is kept. A missing or non-numeric
    /// completion value drops the row.
    pub fn filter_complete(df: DataFrame, config: &EngineConfig) -> Result<DataFrame, LoadError> {
        let Ok(progress) = df.column(&config.completion_field) else {
            debug!(
                "No '{}' column; treating all {} rows as complete",
                config.completion_field,
                df.height()
            );
            return Ok(df);
        };

        let values = progress.cast(&DataType::Float64).map_err(malformed)?;
        let keep: Vec<bool> = values
            .f64()
            .map_err(malformed)?
            .into_iter()
            .map(|v| v.is_some_and(|x| (x - config.completion_target).abs() < 1e-9))
            .collect();

        let mask = BooleanChunked::from_slice("complete".into(), &keep);
        df.filter(&mask).map_err(malformed)
    }

    fn detect_format(file_name: &str) -> Result<UploadFormat, LoadError> {
        let extension = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(UploadFormat::Delimited(b',')),
            "tsv" | "tab" | "txt" => Ok(UploadFormat::Delimited(b'\t')),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(UploadFormat::Workbook),
            _ => Err(LoadError::MalformedInput(format!(
                "unsupported file type: {file_name}"
            ))),
        }
    }

    fn read_upload(file_name: &str, bytes: &[u8]) -> Result<DataFrame, LoadError> {
        let df = match Self::detect_format(file_name)? {
            UploadFormat::Delimited(separator) => Self::read_delimited(bytes, separator)?,
            UploadFormat::Workbook => Self::read_workbook(bytes)?,
        };
        debug!(
            "Decoded {}: {} rows x {} columns",
            file_name,
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Parse delimited text with a header row.
    pub fn read_delimited(bytes: &[u8], separator: u8) -> Result<DataFrame, LoadError> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(LoadError::MalformedInput("file is empty".to_string()));
        }

        Self::check_header(&Self::delimited_header(bytes, separator)?)?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(malformed)
    }

    /// Raw header names of delimited text. The CSV reader renames duplicates,
    /// so they are read as a plain first row instead.
    fn delimited_header(bytes: &[u8], separator: u8) -> Result<Vec<String>, LoadError> {
        let first_row = CsvReadOptions::default()
            .with_has_header(false)
            .with_n_rows(Some(1))
            .with_infer_schema_length(Some(0))
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(malformed)?;

        first_row
            .get_columns()
            .iter()
            .map(|column| {
                let cell = column.get(0).map_err(malformed)?;
                Ok(match cell {
                    AnyValue::String(s) => s.trim().to_string(),
                    AnyValue::StringOwned(s) => s.trim().to_string(),
                    _ => String::new(),
                })
            })
            .collect()
    }

    /// Parse the first worksheet of an Excel or ODS workbook; row 1 is the header.
    pub fn read_workbook(bytes: &[u8]) -> Result<DataFrame, LoadError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(malformed)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| LoadError::MalformedInput("workbook has no worksheets".to_string()))?
            .map_err(malformed)?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| LoadError::MalformedInput("worksheet is empty".to_string()))?;
        let names: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();
        Self::check_header(&names)?;

        let mut cells: Vec<Vec<Option<&Data>>> = vec![Vec::new(); names.len()];
        for row in rows {
            for (idx, column) in cells.iter_mut().enumerate() {
                column.push(row.get(idx));
            }
        }

        let columns = names
            .iter()
            .zip(cells.iter())
            .map(|(name, values)| workbook_column(name, values))
            .collect();

        DataFrame::new(columns).map_err(malformed)
    }

    fn check_header(names: &[String]) -> Result<(), LoadError> {
        if names.is_empty() {
            return Err(LoadError::MalformedInput("header row is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for (idx, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(LoadError::MalformedInput(format!(
                    "header cell {} is blank",
                    idx + 1
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(LoadError::MalformedInput(format!(
                    "duplicate column name: {name}"
                )));
            }
        }
        Ok(())
    }
}

fn is_blank(cell: Option<&Data>) -> bool {
    match cell {
        None | Some(Data::Empty) => true,
        Some(Data::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// A worksheet column becomes Float64 when every non-blank cell is numeric, String otherwise.
fn workbook_column(name: &str, cells: &[Option<&Data>]) -> Column {
    let numeric = cells
        .iter()
        .filter(|c| !is_blank(**c))
        .all(|c| c.and_then(cell_number).is_some());

    if numeric {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| if is_blank(*c) { None } else { c.and_then(cell_number) })
            .collect();
        Column::new(name.into(), values)
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|c| {
                if is_blank(*c) {
                    None
                } else {
                    c.map(|d| d.to_string())
                }
            })
            .collect();
        Column::new(name.into(), values)
    }
}
