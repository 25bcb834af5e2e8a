use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PullError;
use crate::pull::YearEndPull;
use crate::schema::table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Parquet,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "parquet" => Ok(ReportFormat::Parquet),
            other => Err(format!(
                "Invalid format: '{other}'. Must be 'csv' or 'parquet'"
            )),
        }
    }
}

/// Write transactions, work periods, worksite histories, the stacked
/// per-year windows and the per-year counts into `output_path`.
///
/// Returns the written file paths in that order.
pub fn write_report(
    pull: &YearEndPull,
    output_path: &Path,
    format: ReportFormat,
) -> Result<Vec<PathBuf>, PullError> {
    fs::create_dir_all(output_path)?;

    let tables = [
        (table::TRANSACTIONS, pull.transactions.clone()),
        (table::WORK_PERIODS, pull.work_periods.clone()),
        (table::WORKSITE_HISTORIES, pull.worksite_histories.clone()),
        (table::WINDOWS, pull.stacked_windows()?),
        (table::WINDOW_COUNTS, pull.window_counts()?),
    ];

    let mut written = Vec::with_capacity(tables.len());
    for (name, mut df) in tables {
        let path = output_path.join(format!("{name}.{}", format.extension()));
        write_table(&mut df, &path, format)?;
        written.push(path);
    }

    info!(
        pull_id = %pull.pull_id,
        output_path = %output_path.display(),
        %format,
        files = written.len(),
        "wrote year end report"
    );
    Ok(written)
}

fn write_table(df: &mut DataFrame, path: &Path, format: ReportFormat) -> Result<(), PullError> {
    let file = File::create(path)?;
    match format {
        ReportFormat::Csv => {
            CsvWriter::new(file).include_header(true).finish(df)?;
        }
        ReportFormat::Parquet => {
            ParquetWriter::new(file).finish(df)?;
        }
    }
    Ok(())
}
