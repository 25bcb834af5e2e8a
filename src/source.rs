use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PullError;
use crate::schema::table;

/// Named, parameterized queries issued by a year-end pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Transactions { start_year: i32 },
    WorkPeriods { start_year: i32 },
    WorksiteHistories,
}

impl Query {
    pub fn name(&self) -> &'static str {
        match self {
            Query::Transactions { .. } => table::TRANSACTIONS,
            Query::WorkPeriods { .. } => table::WORK_PERIODS,
            Query::WorksiteHistories => table::WORKSITE_HISTORIES,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, i32)> {
        match *self {
            Query::Transactions { start_year } | Query::WorkPeriods { start_year } => {
                vec![("start_year", start_year)]
            }
            Query::WorksiteHistories => Vec::new(),
        }
    }
}

pub trait DataSource {
    /// Open the connection shared by every query of one pull.
    fn connect(&self) -> Result<Box<dyn Connection + '_>, PullError>;
}

pub trait Connection {
    /// Run `query` and return its fully materialized result.
    fn pull(&mut self, query: &Query) -> Result<DataFrame, PullError>;
}

// ── CSV extracts ────────────────────────────────────────────────────────────

/// File-name templates for each query. `{start_year}` is replaced with the
/// query parameter of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTemplates {
    pub transactions: String,
    pub work_periods: String,
    pub worksite_histories: String,
}

impl Default for FileTemplates {
    fn default() -> Self {
        Self {
            transactions: "transactions_{start_year}.csv".to_string(),
            work_periods: "work_periods_{start_year}.csv".to_string(),
            worksite_histories: "worksite_histories.csv".to_string(),
        }
    }
}

impl FileTemplates {
    pub fn resolve(&self, query: &Query) -> String {
        let template = match query {
            Query::Transactions { .. } => &self.transactions,
            Query::WorkPeriods { .. } => &self.work_periods,
            Query::WorksiteHistories => &self.worksite_histories,
        };
        query
            .params()
            .into_iter()
            .fold(template.clone(), |name, (key, value)| {
                name.replace(&format!("{{{key}}}"), &value.to_string())
            })
    }
}

/// Query extracts stored as CSV files under one directory.
///
/// Every column is loaded as a string so descriptive columns pass through
/// verbatim; typed columns are parsed by their consumers.
#[derive(Debug, Clone)]
pub struct CsvSource {
    base_path: PathBuf,
    files: FileTemplates,
}

impl CsvSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            files: FileTemplates::default(),
        }
    }

    pub fn with_files(mut self, files: FileTemplates) -> Self {
        self.files = files;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl DataSource for CsvSource {
    fn connect(&self) -> Result<Box<dyn Connection + '_>, PullError> {
        if !self.base_path.is_dir() {
            return Err(PullError::Connection(format!(
                "extract directory '{}' does not exist",
                self.base_path.display()
            )));
        }
        debug!(base_path = %self.base_path.display(), "opened csv extract directory");
        Ok(Box::new(CsvConnection { source: self }))
    }
}

struct CsvConnection<'a> {
    source: &'a CsvSource,
}

impl Connection for CsvConnection<'_> {
    fn pull(&mut self, query: &Query) -> Result<DataFrame, PullError> {
        let path = self.source.base_path.join(self.source.files.resolve(query));
        debug!(query = query.name(), path = %path.display(), "reading csv extract");
        read_csv_as_strings(&path)
            .map_err(|e| PullError::data_access(query.name(), format!("{}: {e}", path.display())))
    }
}

/// Read a CSV file with all columns as String dtype and trimmed header names.
fn read_csv_as_strings(path: &Path) -> Result<DataFrame, PolarsError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

// ── In-memory tables ────────────────────────────────────────────────────────

/// Serves pre-built frames by query name.
///
/// Tracks open connections and the queries issued through them, so callers
/// can confirm the pull released its connection.
#[derive(Default)]
pub struct MemorySource {
    tables: HashMap<&'static str, DataFrame>,
    failures: HashMap<&'static str, String>,
    open_connections: Cell<usize>,
    history: RefCell<Vec<Query>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the result returned for every query named `name`.
    pub fn with_table(mut self, name: &'static str, df: DataFrame) -> Self {
        self.tables.insert(name, df);
        self
    }

    /// Make every query named `name` fail with `message`.
    pub fn with_failure(mut self, name: &'static str, message: impl Into<String>) -> Self {
        self.failures.insert(name, message.into());
        self
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.get()
    }

    /// Queries issued so far, in order.
    pub fn history(&self) -> Vec<Query> {
        self.history.borrow().clone()
    }
}

impl DataSource for MemorySource {
    fn connect(&self) -> Result<Box<dyn Connection + '_>, PullError> {
        self.open_connections.set(self.open_connections.get() + 1);
        Ok(Box::new(MemoryConnection { source: self }))
    }
}

struct MemoryConnection<'a> {
    source: &'a MemorySource,
}

impl Connection for MemoryConnection<'_> {
    fn pull(&mut self, query: &Query) -> Result<DataFrame, PullError> {
        self.source.history.borrow_mut().push(*query);

        let name = query.name();
        if let Some(message) = self.source.failures.get(name) {
            return Err(PullError::data_access(name, message));
        }
        self.source
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| PullError::data_access(name, "no table registered"))
    }
}

impl Drop for MemoryConnection<'_> {
    fn drop(&mut self) {
        let open = self.source.open_connections.get();
        self.source.open_connections.set(open.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn templates_substitute_start_year() {
        let files = FileTemplates::default();
        assert_eq!(
            files.resolve(&Query::WorkPeriods { start_year: 2021 }),
            "work_periods_2021.csv"
        );
        assert_eq!(
            files.resolve(&Query::Transactions { start_year: 2019 }),
            "transactions_2019.csv"
        );
        assert_eq!(
            files.resolve(&Query::WorksiteHistories),
            "worksite_histories.csv"
        );
    }

    #[test]
    fn csv_source_reads_strings_with_trimmed_headers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("work_periods_2020.csv"),
            "EmployeeID , MonthsSinceAdd,MonthsSinceDel\n007,0,24\n042,12,\n",
        )
        .unwrap();

        let source = CsvSource::new(dir.path());
        let mut conn = source.connect().unwrap();
        let df = conn.pull(&Query::WorkPeriods { start_year: 2020 }).unwrap();

        assert_eq!(
            df.get_column_names_str(),
            vec!["EmployeeID", "MonthsSinceAdd", "MonthsSinceDel"]
        );
        let ids = df.column("EmployeeID").unwrap().str().unwrap();
        // leading zeros survive because nothing is inferred
        assert_eq!(ids.get(0), Some("007"));
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn missing_directory_is_a_connection_error() {
        let source = CsvSource::new("/definitely/not/here");
        assert!(matches!(source.connect(), Err(PullError::Connection(_))));
    }

    #[test]
    fn missing_extract_names_the_query() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::new(dir.path());
        let mut conn = source.connect().unwrap();

        match conn.pull(&Query::WorksiteHistories).unwrap_err() {
            PullError::DataAccess { query, message } => {
                assert_eq!(query, table::WORKSITE_HISTORIES);
                assert!(message.contains("worksite_histories.csv"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn memory_source_releases_connection_on_drop() {
        let source = MemorySource::new().with_table(table::WORKSITE_HISTORIES, DataFrame::empty());
        {
            let mut conn = source.connect().unwrap();
            assert_eq!(source.open_connections(), 1);
            conn.pull(&Query::WorksiteHistories).unwrap();
            assert!(conn.pull(&Query::WorkPeriods { start_year: 2020 }).is_err());
        }
        assert_eq!(source.open_connections(), 0);
        assert_eq!(
            source.history(),
            vec![
                Query::WorksiteHistories,
                Query::WorkPeriods { start_year: 2020 }
            ]
        );
    }
}
