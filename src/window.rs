use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::debug;

use crate::error::PullError;
use crate::schema::{table, window, work_period};

/// Inclusive range of pull years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    start_year: i32,
    end_year: i32,
}

impl YearRange {
    pub fn new(start_year: i32, end_year: i32) -> Result<Self, PullError> {
        if start_year > end_year {
            return Err(PullError::InvalidYearRange {
                start_year,
                end_year,
            });
        }
        Ok(Self {
            start_year,
            end_year,
        })
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }
}

/// Months elapsed from January of `reference_start_year` to January of `pull_year`.
/// Negative when the pull year precedes the reference year.
pub fn month_equivalent(pull_year: i32, reference_start_year: i32) -> i64 {
    (i64::from(pull_year) - i64::from(reference_start_year)) * 12
}

/// Rows of `intervals` active in `pull_year`, in their original order.
///
/// Bound columns may be integer or string typed (see [`normalize_bounds`]);
/// every other column is passed through untouched.
pub fn compute_window(
    intervals: &DataFrame,
    pull_year: i32,
    reference_start_year: i32,
) -> Result<DataFrame, PullError> {
    let intervals = normalize_bounds(intervals)?;
    filter_active(&intervals, month_equivalent(pull_year, reference_start_year))
}

/// One window per year in `[start_year, end_year]`, each evaluated
/// independently against `start_year`.
pub fn compute_windows_for_range(
    intervals: &DataFrame,
    start_year: i32,
    end_year: i32,
) -> Result<BTreeMap<i32, DataFrame>, PullError> {
    let range = YearRange::new(start_year, end_year)?;
    let intervals = normalize_bounds(intervals)?;

    let mut windows = BTreeMap::new();
    for pull_year in range.years() {
        let offset = month_equivalent(pull_year, range.start_year());
        let active = filter_active(&intervals, offset)?;
        debug!(
            pull_year,
            month_equivalent = offset,
            active_rows = active.height(),
            "computed work period window"
        );
        windows.insert(pull_year, active);
    }
    Ok(windows)
}

/// Coerce both bound columns to `Int64`.
///
/// Integer columns are widened. String columns are trimmed and parsed
/// strictly; empty cells become null and any other non-integer text fails
/// with the offending row. Other dtypes are rejected.
pub fn normalize_bounds(intervals: &DataFrame) -> Result<DataFrame, PullError> {
    let mut df = intervals.clone();

    for name in work_period::BOUNDS {
        let column = df
            .column(name)
            .map_err(|_| PullError::MissingColumn {
                table: table::WORK_PERIODS.to_string(),
                column: name.to_string(),
            })?;

        let normalized = match column.dtype() {
            DataType::Int64 => continue,
            dtype if dtype.is_integer() => column.strict_cast(&DataType::Int64)?,
            DataType::String => parse_integer_column(column)?,
            // An all-null column read without a schema comes back as Null.
            DataType::Null => Column::full_null(name.into(), column.len(), &DataType::Int64),
            other => {
                return Err(PullError::InvalidData(format!(
                    "Column '{name}' must hold integer month offsets, found {other}"
                )))
            }
        };
        df.with_column(normalized)?;
    }

    Ok(df)
}

fn parse_integer_column(column: &Column) -> Result<Column, PullError> {
    let name = column.name().clone();
    let values = column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text.parse::<i64>().map(Some).map_err(|_| {
                PullError::InvalidData(format!(
                    "Column '{name}' row {row}: '{text}' is not an integer month offset"
                ))
            }),
        })
        .collect::<Result<Vec<Option<i64>>, PullError>>()?;

    Ok(Column::new(name, values))
}

fn filter_active(intervals: &DataFrame, month_equivalent: i64) -> Result<DataFrame, PullError> {
    let added = col(work_period::MONTHS_SINCE_ADD);
    let deleted = col(work_period::MONTHS_SINCE_DEL);

    let df = intervals
        .clone()
        .lazy()
        .filter(
            added
                .clone()
                .is_not_null()
                .and(added.lt_eq(lit(month_equivalent)))
                .and(
                    // null delete offset means still active
                    deleted
                        .clone()
                        .is_null()
                        .or(deleted.gt_eq(lit(month_equivalent))),
                ),
        )
        .collect()?;

    Ok(df)
}

/// Long-form view of a window mapping: every window prefixed with a
/// `PullYear` column and stacked in year order.
pub fn stack_windows(windows: &BTreeMap<i32, DataFrame>) -> Result<DataFrame, PullError> {
    let mut stacked: Option<DataFrame> = None;

    for (&year, frame) in windows {
        let mut tagged = frame.clone();
        tagged.insert_column(
            0,
            Column::new(window::PULL_YEAR.into(), vec![year; frame.height()]),
        )?;
        match stacked.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&tagged)?;
            }
            None => stacked = Some(tagged),
        }
    }

    Ok(stacked.unwrap_or_else(DataFrame::empty))
}

/// Active-row count per pull year, typed like polars' own `len()`.
pub fn window_counts(windows: &BTreeMap<i32, DataFrame>) -> Result<DataFrame, PullError> {
    let years: Vec<i32> = windows.keys().copied().collect();
    let counts = windows
        .values()
        .map(|df| {
            IdxSize::try_from(df.height()).map_err(|_| {
                PullError::InvalidData(format!("{} rows exceed the index size", df.height()))
            })
        })
        .collect::<Result<Vec<IdxSize>, PullError>>()?;

    let df = DataFrame::new(vec![
        Column::new(window::PULL_YEAR.into(), years),
        Column::new(window::ACTIVE_COUNT.into(), counts),
    ])?;
    Ok(df)
}
