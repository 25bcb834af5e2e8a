#[cfg(feature = "python")]
use pyo3::exceptions::{PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PullError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query '{query}' failed: {message}")]
    DataAccess { query: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Invalid year range: start year {start_year} is after end year {end_year}")]
    InvalidYearRange { start_year: i32, end_year: i32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PullError {
    pub(crate) fn data_access(query: impl Into<String>, message: impl ToString) -> Self {
        PullError::DataAccess {
            query: query.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(feature = "python")]
impl From<PullError> for PyErr {
    fn from(err: PullError) -> PyErr {
        match err {
            PullError::InvalidYearRange { .. } | PullError::Config(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}
