pub mod config;
pub mod error;
pub mod logging;
pub mod pull;
pub mod report;
pub mod schema;
pub mod source;
pub mod validation;
pub mod window;

#[cfg(feature = "python")]
mod python;

pub use config::PullConfig;
pub use error::PullError;
pub use pull::{YearEndPull, YearEndPullController};
pub use report::{write_report, ReportFormat};
pub use source::{Connection, CsvSource, DataSource, FileTemplates, MemorySource, Query};
pub use validation::{TransactionChecks, TransactionValidator};
pub use window::{compute_window, compute_windows_for_range, month_equivalent, YearRange};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Work periods
    let work_period = PyModule::new(m.py(), "work_period")?;
    work_period.add("MONTHS_SINCE_ADD", schema::work_period::MONTHS_SINCE_ADD)?;
    work_period.add("MONTHS_SINCE_DEL", schema::work_period::MONTHS_SINCE_DEL)?;
    m.add_submodule(&work_period)?;

    // Window output
    let window = PyModule::new(m.py(), "window")?;
    window.add("PULL_YEAR", schema::window::PULL_YEAR)?;
    window.add("ACTIVE_COUNT", schema::window::ACTIVE_COUNT)?;
    m.add_submodule(&window)?;

    // Tables
    let table = PyModule::new(m.py(), "table")?;
    table.add("TRANSACTIONS", schema::table::TRANSACTIONS)?;
    table.add("WORK_PERIODS", schema::table::WORK_PERIODS)?;
    table.add("WORKSITE_HISTORIES", schema::table::WORKSITE_HISTORIES)?;
    m.add_submodule(&table)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn yearend_pull(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyYearEndPullController>()?;
    m.add_class::<python::PyYearEndPull>()?;
    add_schema_exports(m)?;
    Ok(())
}
