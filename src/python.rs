use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3_polars::PyDataFrame;

use crate::config::PullConfig;
use crate::error::PullError;
use crate::pull::{YearEndPull, YearEndPullController};
use crate::report::{self, ReportFormat};
use crate::source::{CsvSource, FileTemplates};
use crate::validation::{TransactionChecks, TransactionValidator};
use crate::window::YearRange;

/// Python callable used as the transaction validator.
///
/// Called as `validator(transactions_df=df)`; any raised exception fails
/// the pull.
struct PyValidator {
    callable: PyObject,
}

impl TransactionValidator for PyValidator {
    fn check(&self, transactions_df: &DataFrame) -> Result<(), PullError> {
        Python::with_gil(|py| -> PyResult<()> {
            let kwargs = PyDict::new(py);
            kwargs.set_item("transactions_df", PyDataFrame(transactions_df.clone()))?;
            self.callable.call(py, (), Some(&kwargs))?;
            Ok(())
        })
        .map_err(|err| PullError::Validation(err.to_string()))
    }
}

#[pyclass(name = "YearEndPullController")]
pub struct PyYearEndPullController {
    output_path: PathBuf,
    base_path: PathBuf,
    range: YearRange,
    files: FileTemplates,
    checks: TransactionChecks,
}

#[pymethods]
impl PyYearEndPullController {
    #[new]
    #[pyo3(signature = (output_path, pull_start_year, pull_end_year, base_path=PathBuf::from(".")))]
    fn new(
        output_path: PathBuf,
        pull_start_year: i32,
        pull_end_year: i32,
        base_path: PathBuf,
    ) -> PyResult<Self> {
        Ok(Self {
            output_path,
            base_path,
            range: YearRange::new(pull_start_year, pull_end_year)?,
            files: FileTemplates::default(),
            checks: TransactionChecks::default(),
        })
    }

    /// Controller built from a TOML config file, as the command line does.
    ///
    /// The file's extract templates and `[validation]` checks are kept; the
    /// checks are used whenever no `validator` is passed to `pull_year_end`.
    #[staticmethod]
    fn from_config(path: PathBuf) -> PyResult<Self> {
        let config = PullConfig::from_file(&path)?;
        config.validate()?;
        Ok(Self {
            output_path: config.pull.output_path.clone(),
            base_path: config.source.base_path.clone(),
            range: config.year_range()?,
            files: config.source.files,
            checks: config.validation,
        })
    }

    /// Run the year-end pull over the CSV extracts in `base_path`.
    ///
    /// With `check_for_errors`, either `validator` or configured checks are
    /// required; they receive the transactions table before anything else is
    /// pulled.
    #[pyo3(signature = (check_for_errors=true, validator=None))]
    fn pull_year_end(
        &self,
        check_for_errors: bool,
        validator: Option<PyObject>,
    ) -> PyResult<PyYearEndPull> {
        let source = CsvSource::new(self.base_path.clone()).with_files(self.files.clone());
        let mut controller = YearEndPullController::new(source, self.range);
        if let Some(callable) = validator {
            controller = controller.with_validator(PyValidator { callable });
        } else if !self.checks.is_empty() {
            controller = controller.with_validator(self.checks.clone());
        }
        let pull = controller.pull_year_end(check_for_errors)?;
        Ok(PyYearEndPull { inner: pull })
    }

    /// Write every table of `pull` to `output_path` as csv or parquet.
    #[pyo3(signature = (pull, format="csv"))]
    fn write_report(
        &self,
        pull: PyRef<'_, PyYearEndPull>,
        format: &str,
    ) -> PyResult<Vec<PathBuf>> {
        let format: ReportFormat = format
            .parse()
            .map_err(pyo3::exceptions::PyValueError::new_err)?;
        Ok(report::write_report(&pull.inner, &self.output_path, format)?)
    }

    #[getter]
    fn output_path(&self) -> PathBuf {
        self.output_path.clone()
    }

    #[getter]
    fn base_path(&self) -> PathBuf {
        self.base_path.clone()
    }

    #[getter]
    fn start_year(&self) -> i32 {
        self.range.start_year()
    }

    #[getter]
    fn end_year(&self) -> i32 {
        self.range.end_year()
    }
}

#[pyclass(name = "YearEndPull")]
pub struct PyYearEndPull {
    inner: YearEndPull,
}

#[pymethods]
impl PyYearEndPull {
    #[getter]
    fn pull_id(&self) -> String {
        self.inner.pull_id.to_string()
    }

    #[getter]
    fn pulled_at(&self) -> NaiveDateTime {
        self.inner.pulled_at
    }

    #[getter]
    fn transactions_df(&self) -> PyDataFrame {
        PyDataFrame(self.inner.transactions.clone())
    }

    #[getter]
    fn work_periods_df(&self) -> PyDataFrame {
        PyDataFrame(self.inner.work_periods.clone())
    }

    #[getter]
    fn worksite_histories_df(&self) -> PyDataFrame {
        PyDataFrame(self.inner.worksite_histories.clone())
    }

    /// Active work periods keyed by pull year.
    #[getter]
    fn windows(&self) -> BTreeMap<i32, PyDataFrame> {
        self.inner
            .windows
            .iter()
            .map(|(year, df)| (*year, PyDataFrame(df.clone())))
            .collect()
    }

    /// All windows stacked with a leading `PullYear` column.
    fn stacked_windows(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.stacked_windows()?))
    }

    fn window_counts(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.window_counts()?))
    }
}
