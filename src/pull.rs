use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use polars::prelude::*;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::config::PullConfig;
use crate::error::PullError;
use crate::source::{Connection, CsvSource, DataSource, Query};
use crate::validation::TransactionValidator;
use crate::window::{self, YearRange};

/// Everything retrieved and derived by one year-end pull.
pub struct YearEndPull {
    pub pull_id: Uuid,
    pub pulled_at: NaiveDateTime,
    pub range: YearRange,
    pub transactions: DataFrame,
    /// Work periods with `Int64` bound columns.
    pub work_periods: DataFrame,
    /// Active work periods keyed by pull year, one entry per year of `range`.
    pub windows: BTreeMap<i32, DataFrame>,
    pub worksite_histories: DataFrame,
}

impl YearEndPull {
    pub fn window(&self, pull_year: i32) -> Option<&DataFrame> {
        self.windows.get(&pull_year)
    }

    pub fn stacked_windows(&self) -> Result<DataFrame, PullError> {
        window::stack_windows(&self.windows)
    }

    pub fn window_counts(&self) -> Result<DataFrame, PullError> {
        window::window_counts(&self.windows)
    }
}

/// Sequences the queries of a year-end pull around the window computation.
pub struct YearEndPullController<S> {
    source: S,
    range: YearRange,
    validator: Option<Box<dyn TransactionValidator>>,
}

impl YearEndPullController<CsvSource> {
    /// Controller over CSV extracts, with the configured transaction checks.
    pub fn from_config(config: &PullConfig) -> Result<Self, PullError> {
        config.validate()?;
        let source =
            CsvSource::new(config.source.base_path.clone()).with_files(config.source.files.clone());
        let controller = Self::new(source, config.year_range()?);
        // no configured checks leaves the controller without a validator
        if config.validation.is_empty() {
            return Ok(controller);
        }
        Ok(controller.with_validator(config.validation.clone()))
    }
}

impl<S: DataSource> YearEndPullController<S> {
    pub fn new(source: S, range: YearRange) -> Self {
        Self {
            source,
            range,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: impl TransactionValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run the pull over one connection.
    ///
    /// Any query or validation failure aborts the whole pull; the connection
    /// is released on every exit path.
    pub fn pull_year_end(&self, check_for_errors: bool) -> Result<YearEndPull, PullError> {
        let pull_id = Uuid::new_v4();
        let span = info_span!("year_end_pull", %pull_id);
        let _guard = span.enter();

        let start_year = self.range.start_year();
        let end_year = self.range.end_year();
        info!(start_year, end_year, check_for_errors, "Beginning year end pull.");

        let validator = match (check_for_errors, self.validator.as_deref()) {
            (false, _) => None,
            (true, Some(validator)) => Some(validator),
            (true, None) => {
                return Err(PullError::Config(
                    "error checking requested but no validator is configured".into(),
                ))
            }
        };

        let mut conn = self.source.connect()?;

        let transactions = fetch(conn.as_mut(), Query::Transactions { start_year })?;

        if let Some(validator) = validator {
            info!("Checking for errors before pulling year end.");
            validator.check(&transactions)?;
        }

        let work_periods = fetch(conn.as_mut(), Query::WorkPeriods { start_year })?;
        let work_periods = window::normalize_bounds(&work_periods)?;
        let windows = window::compute_windows_for_range(&work_periods, start_year, end_year)?;

        let worksite_histories = fetch(conn.as_mut(), Query::WorksiteHistories)?;
        drop(conn);

        info!(
            work_periods = work_periods.height(),
            worksite_histories = worksite_histories.height(),
            years = windows.len(),
            "Finished year end pull."
        );

        Ok(YearEndPull {
            pull_id,
            pulled_at: Utc::now().naive_utc(),
            range: self.range,
            transactions,
            work_periods,
            windows,
            worksite_histories,
        })
    }
}

fn fetch(conn: &mut (dyn Connection + '_), query: Query) -> Result<DataFrame, PullError> {
    let df = conn.pull(&query)?;
    debug!(query = query.name(), rows = df.height(), "pulled table");
    Ok(df)
}
