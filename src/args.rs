use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cross-tabulation and summary statistics for survey responses.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) Survey export (.csv, .tsv, .xlsx, .xls, .ods). The bundled
    /// sample survey is used when omitted or when the file cannot be loaded.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// (file path, optional) TOML file overriding thresholds and field names.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// If passed as an argument, will turn on debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Completion counts, role distribution and most disrupted services.
    Overview,
    /// Prevalence and association tests for one indicator set.
    Indicator {
        /// Indicator set id (1-5).
        #[arg(short, long)]
        set: u8,
    },
    /// Cross-tabulate an outcome field against a grouping field.
    Crosstab {
        #[arg(short, long)]
        outcome: String,
        #[arg(short, long)]
        group: String,
        /// FIELD=value1,value2 (repeatable).
        #[arg(short, long, value_parser = parse_filter)]
        filter: Vec<(String, Vec<String>)>,
        /// (file path) Write the table in delimited long format.
        #[arg(short, long)]
        export: Option<PathBuf>,
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },
    /// Count filtered rows, optionally per category of a grouping field.
    Summary {
        #[arg(short, long, value_parser = parse_filter)]
        filter: Vec<(String, Vec<String>)>,
        #[arg(short, long)]
        group: Option<String>,
        #[arg(short, long)]
        export: Option<PathBuf>,
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },
    /// Compare yes/no rates of fields across the categories of a grouping field.
    Compare {
        /// Comma-separated yes/no field names.
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
        #[arg(short, long)]
        group: String,
        #[arg(short, long, value_parser = parse_filter)]
        filter: Vec<(String, Vec<String>)>,
        #[arg(short, long)]
        export: Option<PathBuf>,
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },
    /// Pearson correlation matrix of numeric-coded fields.
    Correlate {
        /// Comma-separated field names.
        #[arg(short, long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
    },
    /// Numeric statistics of one field per category of another.
    Describe {
        #[arg(short, long)]
        group: String,
        #[arg(long)]
        value: String,
    },
    /// Share of rows answering each field.
    Completeness,
}

/// Parse `FIELD=value1,value2`.
fn parse_filter(s: &str) -> Result<(String, Vec<String>), String> {
    let (field, values) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=value1,value2, got {s:?}"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in {s:?}"));
    }
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Err(format!("no values given for {field}"));
    }
    Ok((field.to_string(), values))
}
