use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PullError;
use crate::schema::table;

/// Data-quality gate over the transactions table.
///
/// Implementations are opaque to the pull: it hands over the table and
/// aborts on any error returned.
pub trait TransactionValidator {
    fn check(&self, transactions_df: &DataFrame) -> Result<(), PullError>;
}

impl<F> TransactionValidator for F
where
    F: Fn(&DataFrame) -> Result<(), PullError>,
{
    fn check(&self, transactions_df: &DataFrame) -> Result<(), PullError> {
        self(transactions_df)
    }
}

/// Column-level transaction checks.
///
/// All problems found are reported together in one validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionChecks {
    /// Columns that must be present.
    pub required_columns: Vec<String>,
    /// Columns that must not contain nulls.
    pub non_null_columns: Vec<String>,
    /// Columns whose combined values must be unique per row.
    pub unique_key: Vec<String>,
}

impl TransactionChecks {
    /// True when no check is configured.
    pub fn is_empty(&self) -> bool {
        self.required_columns.is_empty()
            && self.non_null_columns.is_empty()
            && self.unique_key.is_empty()
    }

    fn problems(&self, df: &DataFrame) -> Result<Vec<String>, PullError> {
        let mut problems = Vec::new();
        let schema = df.schema();

        for name in &self.required_columns {
            if !schema.contains(name) {
                problems.push(format!("missing required column '{name}'"));
            }
        }

        for name in &self.non_null_columns {
            match df.column(name) {
                Ok(column) if column.null_count() > 0 => problems.push(format!(
                    "column '{name}' has {} null values",
                    column.null_count()
                )),
                Ok(_) => {}
                Err(_) => problems.push(format!("missing non-null column '{name}'")),
            }
        }

        if !self.unique_key.is_empty() {
            let missing = self
                .unique_key
                .iter()
                .find(|c| !schema.contains(c.as_str()));
            if let Some(missing) = missing {
                problems.push(format!("missing unique key column '{missing}'"));
            } else {
                let duplicates = df
                    .clone()
                    .lazy()
                    .group_by(self.unique_key.iter().map(|c| col(c)).collect::<Vec<_>>())
                    .agg([len().alias("_key_count")])
                    .filter(col("_key_count").gt(lit(1)))
                    .collect()?;

                if duplicates.height() > 0 {
                    problems.push(format!(
                        "{} key values of ({}) occur on more than one row",
                        duplicates.height(),
                        self.unique_key.join(", ")
                    ));
                }
            }
        }

        Ok(problems)
    }
}

impl TransactionValidator for TransactionChecks {
    fn check(&self, transactions_df: &DataFrame) -> Result<(), PullError> {
        let problems = self.problems(transactions_df)?;
        if problems.is_empty() {
            return Ok(());
        }
        Err(PullError::Validation(format!(
            "{}: {}",
            table::TRANSACTIONS,
            problems.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transactions() -> DataFrame {
        df!(
            "TransactionID" => [Some("t1"), Some("t2"), Some("t2"), None],
            "EmployeeID" => ["a", "b", "c", "d"],
        )
        .unwrap()
    }

    #[test]
    fn default_checks_accept_anything() {
        let checks = TransactionChecks::default();
        assert!(checks.is_empty());
        assert!(checks.check(&transactions()).is_ok());
    }

    #[test]
    fn any_configured_check_makes_checks_non_empty() {
        let checks = TransactionChecks {
            unique_key: vec!["TransactionID".into()],
            ..Default::default()
        };
        assert!(!checks.is_empty());
    }

    #[test]
    fn every_problem_is_reported() {
        let checks = TransactionChecks {
            required_columns: vec!["Amount".into()],
            non_null_columns: vec!["TransactionID".into()],
            unique_key: vec!["TransactionID".into()],
        };

        match checks.check(&transactions()).unwrap_err() {
            PullError::Validation(msg) => {
                assert!(msg.contains("missing required column 'Amount'"), "{msg}");
                assert!(msg.contains("'TransactionID' has 1 null values"), "{msg}");
                assert!(msg.contains("1 key values of (TransactionID)"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn composite_key_can_be_unique() {
        let checks = TransactionChecks {
            unique_key: vec!["TransactionID".into(), "EmployeeID".into()],
            ..Default::default()
        };
        assert!(checks.check(&transactions()).is_ok());
    }

    #[test]
    fn closures_are_validators() {
        let reject_empty = |df: &DataFrame| {
            if df.height() == 0 {
                Err(PullError::Validation("no transactions".into()))
            } else {
                Ok(())
            }
        };
        assert!(reject_empty.check(&transactions()).is_ok());
        assert!(reject_empty.check(&DataFrame::empty()).is_err());
    }
}
