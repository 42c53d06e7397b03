//! Per-request raw call records and the features derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::{DISPATCH_RESPONSE_SECONDS, HOUR, INCIDENT_DURATION, YEAR};

/// A directly supplied field value.
///
/// Manual entry produces numbers; uploaded tables produce raw text cells
/// that are only accepted as features if they parse as finite numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A numeric value.
    Number(f64),
    /// A raw text value (e.g. a CSV cell).
    Text(String),
}

impl FieldValue {
    /// Returns the value as a finite number, parsing text if needed.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|n| n.is_finite())
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Names of the table columns that carry a record's non-feature inputs.
///
/// Every other column of an uploaded table is treated as a direct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputColumns {
    /// Column holding the raw call-type token.
    #[serde(default = "default_call_type")]
    pub call_type: String,
    /// Column holding the incident start datetime.
    #[serde(default = "default_incident_datetime")]
    pub incident_datetime: String,
    /// Column holding the incident close datetime.
    #[serde(default = "default_close_datetime")]
    pub close_datetime: String,
    /// Column holding the first-assignment datetime.
    #[serde(default = "default_first_assignment_datetime")]
    pub first_assignment_datetime: String,
}

fn default_call_type() -> String {
    "INITIAL_CALL_TYPE".to_owned()
}

fn default_incident_datetime() -> String {
    "INCIDENT_DATETIME".to_owned()
}

fn default_close_datetime() -> String {
    "INCIDENT_CLOSE_DATETIME".to_owned()
}

fn default_first_assignment_datetime() -> String {
    "FIRST_ASSIGNMENT_DATETIME".to_owned()
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            call_type: default_call_type(),
            incident_datetime: default_incident_datetime(),
            close_datetime: default_close_datetime(),
            first_assignment_datetime: default_first_assignment_datetime(),
        }
    }
}

/// Everything the presentation layer collected for one incident.
///
/// Constructed fresh per prediction request and immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCallRecord {
    call_type: Option<String>,
    incident_datetime: Option<String>,
    close_datetime: Option<String>,
    first_assignment_datetime: Option<String>,
    fields: BTreeMap<String, FieldValue>,
}

impl RawCallRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw call-type token.
    #[must_use]
    pub fn with_call_type(mut self, token: impl Into<String>) -> Self {
        self.call_type = Some(token.into());
        self
    }

    /// Sets the incident start datetime string.
    #[must_use]
    pub fn with_incident_datetime(mut self, value: impl Into<String>) -> Self {
        self.incident_datetime = Some(value.into());
        self
    }

    /// Sets the incident close datetime string.
    #[must_use]
    pub fn with_close_datetime(mut self, value: impl Into<String>) -> Self {
        self.close_datetime = Some(value.into());
        self
    }

    /// Sets the first-assignment datetime string.
    #[must_use]
    pub fn with_first_assignment_datetime(mut self, value: impl Into<String>) -> Self {
        self.first_assignment_datetime = Some(value.into());
        self
    }

    /// Adds a directly supplied field, replacing any previous value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builds a record from one row of an uploaded table.
    ///
    /// Cells in the configured call-type and datetime columns populate those
    /// inputs (blank cells count as absent); every other cell becomes a text
    /// field keyed by its header.
    #[must_use]
    pub fn from_row<'a>(
        columns: &InputColumns,
        cells: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut record = Self::new();

        for (header, cell) in cells {
            let present = || {
                let trimmed = cell.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            };

            if header == columns.call_type {
                record.call_type = present();
            } else if header == columns.incident_datetime {
                record.incident_datetime = present();
            } else if header == columns.close_datetime {
                record.close_datetime = present();
            } else if header == columns.first_assignment_datetime {
                record.first_assignment_datetime = present();
            } else {
                record
                    .fields
                    .insert(header.to_owned(), FieldValue::Text(cell.to_owned()));
            }
        }

        record
    }

    /// Returns the raw call-type token, if any.
    #[must_use]
    pub fn call_type(&self) -> Option<&str> {
        self.call_type.as_deref()
    }

    /// Returns the incident start datetime string, if any.
    #[must_use]
    pub fn incident_datetime(&self) -> Option<&str> {
        self.incident_datetime.as_deref()
    }

    /// Returns the incident close datetime string, if any.
    #[must_use]
    pub fn close_datetime(&self) -> Option<&str> {
        self.close_datetime.as_deref()
    }

    /// Returns the first-assignment datetime string, if any.
    #[must_use]
    pub fn first_assignment_datetime(&self) -> Option<&str> {
        self.first_assignment_datetime.as_deref()
    }

    /// Returns the directly supplied fields, keyed by feature name.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }
}

/// Numeric features computed from a record's datetimes.
///
/// A feature is `None` when its source datetimes were not supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedFeatures {
    /// Close time minus start time, in seconds.
    pub incident_duration: Option<i64>,
    /// First-assignment time minus start time, in seconds.
    pub dispatch_response: Option<i64>,
    /// Hour component of the start time.
    pub hour: Option<u32>,
    /// Year component of the start time.
    pub year: Option<i32>,
}

impl DerivedFeatures {
    /// Returns the available derived features as `(feature name, value)`
    /// pairs.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        [
            (INCIDENT_DURATION, self.incident_duration.map(|v| v as f64)),
            (
                DISPATCH_RESPONSE_SECONDS,
                self.dispatch_response.map(|v| v as f64),
            ),
            (HOUR, self.hour.map(f64::from)),
            (YEAR, self.year.map(f64::from)),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_values_parse_as_numbers() {
        assert_eq!(FieldValue::from(" 42 ").as_number(), Some(42.0));
        assert_eq!(FieldValue::from("1.5e3").as_number(), Some(1500.0));
        assert_eq!(FieldValue::from(7.0).as_number(), Some(7.0));
    }

    #[test]
    fn non_numeric_and_non_finite_values_are_rejected() {
        assert_eq!(FieldValue::from("abc").as_number(), None);
        assert_eq!(FieldValue::from("").as_number(), None);
        assert_eq!(FieldValue::from("NaN").as_number(), None);
        assert_eq!(FieldValue::from(f64::INFINITY).as_number(), None);
    }

    #[test]
    fn from_row_splits_inputs_and_fields() {
        let columns = InputColumns::default();
        let record = RawCallRecord::from_row(
            &columns,
            [
                ("INITIAL_CALL_TYPE", "MVA"),
                ("INCIDENT_DATETIME", "2025-03-31 14:30:00"),
                ("INCIDENT_CLOSE_DATETIME", "  "),
                ("YEAR", "2025"),
                ("NOTES", "caller hung up"),
            ],
        );

        assert_eq!(record.call_type(), Some("MVA"));
        assert_eq!(record.incident_datetime(), Some("2025-03-31 14:30:00"));
        assert_eq!(record.close_datetime(), None);
        assert_eq!(record.first_assignment_datetime(), None);
        assert_eq!(record.fields().len(), 2);
        assert_eq!(record.fields()["YEAR"], FieldValue::from("2025"));
    }

    #[test]
    fn derived_entries_skip_missing_values() {
        let derived = DerivedFeatures {
            incident_duration: Some(1800),
            dispatch_response: None,
            hour: Some(14),
            year: None,
        };
        assert_eq!(
            derived.entries(),
            vec![(INCIDENT_DURATION, 1800.0), (HOUR, 14.0)]
        );
    }
}
