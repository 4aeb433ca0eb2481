//! Survey Insight - command-line host
//!
//! Loads a survey export (or the bundled sample) and prints analysis results as JSON.

mod args;

use anyhow::{bail, Context, Result};
use args::{Args, Command};
use clap::Parser;
use log::{info, warn, LevelFilter};
use serde::Serialize;
use std::path::Path;
use survey_insight::data::{DataSource, FilterCriteria};
use survey_insight::stats::DescriptiveStats;
use survey_insight::{export, EngineConfig, Session};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn filters_from(pairs: Vec<(String, Vec<String>)>) -> FilterCriteria {
    let mut filters = FilterCriteria::new();
    for (field, values) in pairs {
        filters.insert(&field, values);
    }
    filters
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {delimiter:?}");
    }
    Ok(delimiter as u8)
}

fn write_export(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    info!("exported {}", path.display());
    Ok(())
}

fn open_session(args: &Args, config: EngineConfig) -> Result<Session> {
    let source = match &args.input {
        Some(path) => match DataSource::from_path(path) {
            Ok(source) => source,
            Err(err) => {
                warn!("cannot read {} ({}), using sample data", path.display(), err);
                DataSource::Sample
            }
        },
        None => DataSource::Sample,
    };
    Session::open_or_sample(&source, config).context("loading survey data")
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let mut session = open_session(&args, config)?;

    match args.command {
        Command::Overview => print_json(&session.overview()?),
        Command::Indicator { set } => print_json(&session.indicator(set)?),
        Command::Crosstab {
            outcome,
            group,
            filter,
            export: export_path,
            delimiter,
        } => {
            let filters = filters_from(filter);
            let result = session
                .cross_tab(&outcome, &group, &filters)
                .with_context(|| format!("cross-tabulating {outcome} x {group}"))?;
            if let Some(path) = export_path {
                let text = export::contingency_to_delimited(&result, delimiter_byte(delimiter)?)?;
                write_export(&path, &text)?;
            }
            print_json(&result)
        }
        Command::Summary {
            filter,
            group,
            export: export_path,
            delimiter,
        } => {
            let filters = filters_from(filter);
            let summary = session.summarize(&filters, group.as_deref())?;
            if let Some(path) = export_path {
                let text = export::summary_to_delimited(&summary, delimiter_byte(delimiter)?)?;
                write_export(&path, &text)?;
            }
            print_json(&summary)
        }
        Command::Compare {
            fields,
            group,
            filter,
            export: export_path,
            delimiter,
        } => {
            let filters = filters_from(filter);
            let comparison = session
                .compare(&fields, &group, &filters)
                .with_context(|| format!("comparing rates across {group}"))?;
            if let Some(path) = export_path {
                let text =
                    export::group_rates_to_delimited(&comparison.rates, delimiter_byte(delimiter)?)?;
                write_export(&path, &text)?;
            }
            print_json(&comparison)
        }
        Command::Correlate { fields } => print_json(&session.correlate(&fields)?),
        Command::Describe { group, value } => print_json(&DescriptiveStats::grouped_numeric_stats(
            session.dataset(),
            &group,
            &value,
        )?),
        Command::Completeness => print_json(&session.completeness()?),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    run(args)
}
