#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Call-type classification and feature reconstruction.
//!
//! Converts heterogeneous raw inputs (manual fields, uploaded tables,
//! free-text datetimes, call-type tokens) into the exact numeric feature
//! rows a trained urgency model expects:
//!
//! 1. [`category::CategoryTables`] classifies call-type tokens.
//! 2. [`parsing`] validates datetimes and derives durations and hours.
//! 3. [`builder::FeatureBuilder`] assembles and aligns rows against a
//!    [`schema::FeatureSchema`], reporting every defaulted column.
//! 4. [`table`] reads uploaded tables and enforces the strict batch
//!    required-column check.

pub mod builder;
pub mod category;
pub mod parsing;
pub mod schema;
pub mod table;

pub use builder::{AlignedBatch, AlignedRecord, FeatureBuilder};
pub use category::{CategoryTable, CategoryTables};
pub use schema::FeatureSchema;
pub use table::{Table, reconcile_batch};

/// A column whose value could not be used as a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    /// Feature name of the offending column.
    pub column: String,
    /// The offending value, as supplied.
    pub value: String,
}

impl std::fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.column, self.value)
    }
}

/// Errors that can occur while reconstructing feature rows.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// A datetime or numeric input was malformed.
    #[error("Invalid {field} {value:?}: {message}")]
    Parse {
        /// Name of the input field.
        field: String,
        /// The rejected input.
        value: String,
        /// What was expected instead.
        message: String,
    },

    /// An uploaded table lacks required columns.
    #[error("Uploaded table is missing required columns: {}", .missing.join(", "))]
    SchemaMismatch {
        /// Every missing column, in required order.
        missing: Vec<String>,
    },

    /// The expected schema or category configuration is unusable.
    #[error("Configuration error: {message}{}", expected_vs_actual(.expected, .actual))]
    Configuration {
        /// Description of what went wrong.
        message: String,
        /// Expected column list, when relevant.
        expected: Vec<String>,
        /// Actual column list, when relevant.
        actual: Vec<String>,
    },

    /// Columns the schema expects to be numeric hold non-numeric data.
    #[error(
        "Non-numeric values in numeric columns: {}",
        .mismatches.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    TypeMismatch {
        /// Every offending column.
        mismatches: Vec<TypeMismatch>,
    },

    /// A batch row failed to build.
    #[error("Row {row}: {source}")]
    Row {
        /// 1-based data row number (the header is row 0).
        row: usize,
        /// The underlying failure.
        source: Box<Self>,
    },

    /// An uploaded table is not valid delimited text. Write failures are
    /// reported as [`FeatureError::Io`].
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeatureError {
    /// Creates a [`FeatureError::Configuration`] without column lists.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            expected: Vec::new(),
            actual: Vec::new(),
        }
    }

    /// Returns `true` if the error stems from user input that the user can
    /// fix, as opposed to a deployment problem.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Parse { .. } | Self::SchemaMismatch { .. } | Self::TypeMismatch { .. } => true,
            Self::Row { source, .. } => source.is_user_error(),
            Self::Csv(_) => true,
            Self::Configuration { .. } | Self::Io(_) => false,
        }
    }
}

fn expected_vs_actual(expected: &[String], actual: &[String]) -> String {
    if expected.is_empty() && actual.is_empty() {
        String::new()
    } else {
        format!(
            " (expected [{}], actual [{}])",
            expected.join(", "),
            actual.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_lists_every_missing_column() {
        let err = FeatureError::SchemaMismatch {
            missing: vec!["YEAR".to_owned(), "INCIDENT_DURATION".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "Uploaded table is missing required columns: YEAR, INCIDENT_DURATION"
        );
    }

    #[test]
    fn configuration_error_shows_expected_and_actual() {
        let err = FeatureError::Configuration {
            message: "scaler width does not match schema".to_owned(),
            expected: vec!["A".to_owned(), "B".to_owned()],
            actual: vec!["A".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: scaler width does not match schema (expected [A, B], actual [A])"
        );
        assert!(!err.is_user_error());
    }

    #[test]
    fn row_errors_keep_the_user_error_flag() {
        let err = FeatureError::Row {
            row: 3,
            source: Box::new(FeatureError::TypeMismatch {
                mismatches: vec![TypeMismatch {
                    column: "YEAR".to_owned(),
                    value: "\"soon\"".to_owned(),
                }],
            }),
        };
        assert!(err.is_user_error());
        assert_eq!(
            err.to_string(),
            "Row 3: Non-numeric values in numeric columns: YEAR = \"soon\""
        );
    }
}
