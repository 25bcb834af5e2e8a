use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PullError;
use crate::report::ReportFormat;
use crate::source::FileTemplates;
use crate::validation::TransactionChecks;
use crate::window::YearRange;

/// Pull configuration loaded from TOML.
///
/// ```toml
/// [pull]
/// start_year = 2020
/// end_year = 2023
/// output_path = "out"
///
/// [source]
/// base_path = "extracts"
///
/// [validation]
/// required_columns = ["TransactionID"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    pub pull: PullSettings,
    pub source: SourceSettings,
    pub validation: TransactionChecks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullSettings {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub check_for_errors: bool,
    /// Directory the report tables are written to.
    pub output_path: PathBuf,
    pub format: ReportFormat,
}

impl Default for PullSettings {
    fn default() -> Self {
        Self {
            start_year: None,
            end_year: None,
            check_for_errors: true,
            output_path: PathBuf::from("out"),
            format: ReportFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Directory holding the query extracts.
    pub base_path: PathBuf,
    pub files: FileTemplates,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            files: FileTemplates::default(),
        }
    }
}

impl PullConfig {
    /// Load config from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PullError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PullError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| PullError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, PullError> {
        toml::from_str(content).map_err(|e| PullError::Config(format!("Failed to parse: {e}")))
    }

    pub fn year_range(&self) -> Result<YearRange, PullError> {
        let start_year = self
            .pull
            .start_year
            .ok_or_else(|| PullError::Config("pull.start_year is not set".into()))?;
        let end_year = self
            .pull
            .end_year
            .ok_or_else(|| PullError::Config("pull.end_year is not set".into()))?;
        YearRange::new(start_year, end_year)
    }

    pub fn validate(&self) -> Result<(), PullError> {
        self.year_range()?;
        if self.source.base_path.as_os_str().is_empty() {
            return Err(PullError::Config("source.base_path must not be empty".into()));
        }
        if self.pull.output_path.as_os_str().is_empty() {
            return Err(PullError::Config("pull.output_path must not be empty".into()));
        }
        Ok(())
    }
}
