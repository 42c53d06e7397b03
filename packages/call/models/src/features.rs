//! Well-known feature column names and manual-entry range checks.
//!
//! The names match the columns of the public EMS incident dispatch dataset
//! the shipped models were trained on. The feature schema artifact remains
//! authoritative; these constants only name the columns this crate knows how
//! to derive or validate.

/// Seconds between incident creation and first unit assignment.
pub const DISPATCH_RESPONSE_SECONDS: &str = "DISPATCH_RESPONSE_SECONDS_QY";
/// Seconds between incident creation and first unit arrival.
pub const INCIDENT_RESPONSE_SECONDS: &str = "INCIDENT_RESPONSE_SECONDS_QY";
/// Seconds between first assignment and first arrival.
pub const INCIDENT_TRAVEL_SECONDS: &str = "INCIDENT_TRAVEL_TM_SECONDS_QY";
/// Calendar year of the incident.
pub const YEAR: &str = "YEAR";
/// Hour of day (0-23) of the incident.
pub const HOUR: &str = "HOUR";
/// Seconds between incident creation and close.
pub const INCIDENT_DURATION: &str = "INCIDENT_DURATION";
/// Integer code of the classified call category.
pub const CALL_CATEGORY_ENCODED: &str = "CALL_CATEGORY_ENCODED";
/// Human-readable call category. Never numeric.
pub const CALL_CATEGORY: &str = "CALL_CATEGORY";

/// Column layout used when no explicit schema artifact is available.
pub const DEFAULT_SCHEMA: &[&str] = &[
    DISPATCH_RESPONSE_SECONDS,
    INCIDENT_RESPONSE_SECONDS,
    INCIDENT_TRAVEL_SECONDS,
    YEAR,
    CALL_CATEGORY_ENCODED,
    INCIDENT_DURATION,
];

/// Smallest year accepted for manual entry.
pub const MIN_YEAR: f64 = 2000.0;
/// Largest year accepted for manual entry.
pub const MAX_YEAR: f64 = 2050.0;

/// Error returned when a manually entered value falls outside the range
/// accepted for its field.
#[derive(Debug, Clone, PartialEq)]
pub struct OutOfRangeError {
    /// Feature name of the offending field.
    pub field: String,
    /// The rejected value.
    pub value: f64,
    /// Human-readable description of the accepted range.
    pub expected: &'static str,
}

impl std::fmt::Display for OutOfRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} is out of range: expected {}",
            self.field, self.value, self.expected
        )
    }
}

impl std::error::Error for OutOfRangeError {}

/// Checks a manually entered value against the range accepted for its
/// field. Fields without a known range are always accepted.
///
/// # Errors
///
/// Returns [`OutOfRangeError`] if the value is non-finite or outside the
/// accepted range.
pub fn check_manual_range(field: &str, value: f64) -> Result<(), OutOfRangeError> {
    let (ok, expected) = match field {
        DISPATCH_RESPONSE_SECONDS
        | INCIDENT_RESPONSE_SECONDS
        | INCIDENT_TRAVEL_SECONDS
        | INCIDENT_DURATION => (value >= 0.0, "a non-negative number of seconds"),
        YEAR => (
            (MIN_YEAR..=MAX_YEAR).contains(&value) && value.fract() == 0.0,
            "a whole year between 2000 and 2050",
        ),
        HOUR => (
            (0.0..=23.0).contains(&value) && value.fract() == 0.0,
            "a whole hour between 0 and 23",
        ),
        _ => (value.is_finite(), "a finite number"),
    };

    if ok {
        Ok(())
    } else {
        Err(OutOfRangeError {
            field: field.to_owned(),
            value,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_in_range_values() {
        assert!(check_manual_range(YEAR, 2024.0).is_ok());
        assert!(check_manual_range(HOUR, 0.0).is_ok());
        assert!(check_manual_range(HOUR, 23.0).is_ok());
        assert!(check_manual_range(INCIDENT_DURATION, 0.0).is_ok());
        assert!(check_manual_range("SOME_OTHER_FEATURE", -5.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(check_manual_range(YEAR, 1999.0).is_err());
        assert!(check_manual_range(YEAR, 2024.5).is_err());
        assert!(check_manual_range(HOUR, 24.0).is_err());
        assert!(check_manual_range(DISPATCH_RESPONSE_SECONDS, -1.0).is_err());
        assert!(check_manual_range("SOME_OTHER_FEATURE", f64::NAN).is_err());
    }

    #[test]
    fn error_names_the_field() {
        let err = check_manual_range(HOUR, 30.0).unwrap_err();
        assert_eq!(err.field, HOUR);
        assert!(err.to_string().contains("HOUR = 30"));
    }

    #[test]
    fn default_schema_has_six_unique_columns() {
        let mut names = DEFAULT_SCHEMA.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
        assert!(!DEFAULT_SCHEMA.contains(&HOUR));
    }
}
