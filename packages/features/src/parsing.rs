//! Datetime validation and derived feature computation.

use chrono::{Datelike as _, NaiveDateTime, Timelike as _};
use urgency_call_models::{DerivedFeatures, RawCallRecord};

use crate::FeatureError;

/// The single accepted datetime format (`YYYY-MM-DD HH:MM:SS`).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a datetime input in [`DATETIME_FORMAT`].
///
/// # Errors
///
/// Returns [`FeatureError::Parse`] naming `field` if the value does not
/// match the format. Malformed timestamps are never treated as missing.
pub fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, FeatureError> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT).map_err(|e| {
        FeatureError::Parse {
            field: field.to_owned(),
            value: value.to_owned(),
            message: format!("expected YYYY-MM-DD HH:MM:SS ({e})"),
        }
    })
}

/// Parses an optional datetime input.
fn parse_optional(field: &str, value: Option<&str>) -> Result<Option<NaiveDateTime>, FeatureError> {
    value.map(|v| parse_datetime(field, v)).transpose()
}

/// Computes the features derivable from a record's datetimes.
///
/// Every supplied datetime is validated first, even ones whose derived
/// feature is unavailable because a counterpart is missing.
///
/// # Errors
///
/// Returns [`FeatureError::Parse`] for the first malformed datetime.
pub fn derive_features(record: &RawCallRecord) -> Result<DerivedFeatures, FeatureError> {
    let start = parse_optional("incident datetime", record.incident_datetime())?;
    let close = parse_optional("incident close datetime", record.close_datetime())?;
    let first_assignment = parse_optional(
        "first assignment datetime",
        record.first_assignment_datetime(),
    )?;

    let Some(start) = start else {
        if close.is_some() || first_assignment.is_some() {
            log::debug!("No incident datetime supplied; skipping derived durations");
        }
        return Ok(DerivedFeatures::default());
    };

    let incident_duration = close.map(|close| (close - start).num_seconds());
    let dispatch_response = first_assignment.map(|assigned| (assigned - start).num_seconds());

    if incident_duration.is_some_and(|s| s < 0) {
        log::warn!("Incident closed before it started: duration {incident_duration:?}s");
    }
    if dispatch_response.is_some_and(|s| s < 0) {
        log::warn!("Unit assigned before incident started: response {dispatch_response:?}s");
    }

    Ok(DerivedFeatures {
        incident_duration,
        dispatch_response,
        hour: Some(start.hour()),
        year: Some(start.year()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_format() {
        let dt = parse_datetime("incident datetime", "2025-03-31 14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2025-03-31 14:30:00");
    }

    #[test]
    fn rejects_other_formats() {
        for bad in ["2025-03-31T14:30:00", "03/31/2025 14:30", "not-a-date", ""] {
            let err = parse_datetime("incident datetime", bad).unwrap_err();
            assert!(
                matches!(&err, FeatureError::Parse { field, .. } if field == "incident datetime"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn derives_duration_response_and_hour() {
        let record = RawCallRecord::new()
            .with_incident_datetime("2025-03-31 14:30:00")
            .with_close_datetime("2025-03-31 15:00:00")
            .with_first_assignment_datetime("2025-03-31 14:35:00");

        let derived = derive_features(&record).unwrap();
        assert_eq!(derived.incident_duration, Some(1800));
        assert_eq!(derived.dispatch_response, Some(300));
        assert_eq!(derived.hour, Some(14));
        assert_eq!(derived.year, Some(2025));
    }

    #[test]
    fn missing_start_derives_nothing() {
        let record = RawCallRecord::new().with_close_datetime("2025-03-31 15:00:00");
        assert_eq!(derive_features(&record).unwrap(), DerivedFeatures::default());
    }

    #[test]
    fn missing_close_leaves_duration_unavailable() {
        let record = RawCallRecord::new().with_incident_datetime("2025-03-31 23:59:59");
        let derived = derive_features(&record).unwrap();
        assert_eq!(derived.incident_duration, None);
        assert_eq!(derived.dispatch_response, None);
        assert_eq!(derived.hour, Some(23));
    }

    #[test]
    fn malformed_counterpart_fails_even_without_start() {
        let record = RawCallRecord::new().with_close_datetime("yesterday");
        let err = derive_features(&record).unwrap_err();
        assert!(matches!(err, FeatureError::Parse { field, .. } if field == "incident close datetime"));
    }

    #[test]
    fn durations_span_midnight() {
        let record = RawCallRecord::new()
            .with_incident_datetime("2025-12-31 23:50:00")
            .with_close_datetime("2026-01-01 00:10:00");
        let derived = derive_features(&record).unwrap();
        assert_eq!(derived.incident_duration, Some(1200));
        assert_eq!(derived.year, Some(2025));
    }
}
