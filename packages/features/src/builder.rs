//! Feature vector assembly and schema alignment.
//!
//! [`FeatureBuilder`] turns a [`RawCallRecord`] into an [`AlignedRecord`]
//! whose columns equal the [`FeatureSchema`] exactly, in order:
//!
//! 1. Datetimes are validated and derived features computed.
//! 2. The call-type token is classified and encoded.
//! 3. Direct fields, derived features and the encoded category are merged
//!    into a working mapping (direct fields win).
//! 4. Schema columns absent from the mapping receive the default value and
//!    are reported as defaulted; direct fields outside the schema are
//!    dropped and reported as dropped.
//!
//! Defaulting is never silent: callers get the full list so a prediction
//! made from degraded input stays auditable.

use std::collections::BTreeMap;

use urgency_call_models::features::{CALL_CATEGORY, CALL_CATEGORY_ENCODED};
use urgency_call_models::{CallCategory, FieldValue, RawCallRecord};

use crate::category::CategoryTables;
use crate::parsing::derive_features;
use crate::schema::FeatureSchema;
use crate::{FeatureError, TypeMismatch};

/// Value inserted for schema columns the input does not supply.
pub const DEFAULT_FILL_VALUE: f64 = 0.0;

/// Assembles schema-aligned feature rows from raw call records.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    tables: CategoryTables,
    default_value: f64,
}

/// One schema-aligned feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    schema: FeatureSchema,
    values: Vec<f64>,
    defaulted: Vec<String>,
    dropped: Vec<String>,
    category: Option<CallCategory>,
}

/// A batch of schema-aligned rows sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedBatch {
    schema: FeatureSchema,
    rows: Vec<AlignedRecord>,
}

impl FeatureBuilder {
    /// Creates a builder that classifies tokens with `tables` and fills
    /// missing columns with [`DEFAULT_FILL_VALUE`].
    #[must_use]
    pub const fn new(tables: CategoryTables) -> Self {
        Self {
            tables,
            default_value: DEFAULT_FILL_VALUE,
        }
    }

    /// Sets the value inserted for missing schema columns.
    #[must_use]
    pub const fn with_default_value(mut self, value: f64) -> Self {
        self.default_value = value;
        self
    }

    /// Returns the category tables used for classification.
    #[must_use]
    pub const fn tables(&self) -> &CategoryTables {
        &self.tables
    }

    /// Returns the value inserted for missing schema columns.
    #[must_use]
    pub const fn default_value(&self) -> f64 {
        self.default_value
    }

    /// Builds one schema-aligned row.
    ///
    /// # Errors
    ///
    /// * [`FeatureError::Configuration`] if the schema is empty.
    /// * [`FeatureError::Parse`] if a datetime input is malformed.
    /// * [`FeatureError::TypeMismatch`] listing every schema column whose
    ///   value is not numeric.
    pub fn build(
        &self,
        raw: &RawCallRecord,
        schema: &FeatureSchema,
    ) -> Result<AlignedRecord, FeatureError> {
        if schema.is_empty() {
            return Err(FeatureError::configuration(
                "expected feature schema is empty",
            ));
        }

        let derived = derive_features(raw)?;
        let category = raw.call_type().map(|token| self.tables.classify(token));

        let mut working: BTreeMap<&str, FieldValue> = derived
            .entries()
            .into_iter()
            .map(|(name, value)| (name, FieldValue::Number(value)))
            .collect();

        if let Some(category) = category {
            working.insert(
                CALL_CATEGORY_ENCODED,
                FieldValue::Number(f64::from(category.code())),
            );
            working.insert(CALL_CATEGORY, FieldValue::Text(category.to_string()));
        }

        for (name, value) in raw.fields() {
            if let Some(previous) = working.insert(name.as_str(), value.clone()) {
                log::debug!("{name}: supplied value {value} overrides derived value {previous}");
            }
        }

        let mut values = Vec::with_capacity(schema.len());
        let mut defaulted = Vec::new();
        let mut mismatches = Vec::new();

        for name in schema.names() {
            match working.get(name.as_str()) {
                Some(value) => match value.as_number() {
                    Some(number) => values.push(number),
                    None => mismatches.push(TypeMismatch {
                        column: name.clone(),
                        value: value.to_string(),
                    }),
                },
                None => {
                    defaulted.push(name.clone());
                    values.push(self.default_value);
                }
            }
        }

        if !mismatches.is_empty() {
            return Err(FeatureError::TypeMismatch { mismatches });
        }

        let dropped: Vec<String> = raw
            .fields()
            .keys()
            .filter(|name| !schema.contains(name))
            .cloned()
            .collect();

        if !defaulted.is_empty() {
            log::debug!(
                "Defaulted {} of {} features to {}: {}",
                defaulted.len(),
                schema.len(),
                self.default_value,
                defaulted.join(", ")
            );
        }
        if !dropped.is_empty() {
            log::debug!("Dropped fields not in schema: {}", dropped.join(", "));
        }

        Ok(AlignedRecord {
            schema: schema.clone(),
            values,
            defaulted,
            dropped,
            category,
        })
    }

    /// Builds one aligned row per record with the same semantics as
    /// [`Self::build`].
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Row`] wrapping the first failing row's error.
    pub fn build_batch(
        &self,
        rows: &[RawCallRecord],
        schema: &FeatureSchema,
    ) -> Result<AlignedBatch, FeatureError> {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                self.build(raw, schema).map_err(|e| FeatureError::Row {
                    row: i + 1,
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AlignedBatch {
            schema: schema.clone(),
            rows,
        })
    }
}

impl AlignedRecord {
    /// Returns the column names, identical to the schema.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.schema.names()
    }

    /// Returns the values in schema order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consumes the record, returning the values in schema order.
    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Returns the value of a column.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.position(name).map(|i| self.values[i])
    }

    /// Returns `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Returns the schema columns that were filled with the default value.
    #[must_use]
    pub fn defaulted(&self) -> &[String] {
        &self.defaulted
    }

    /// Returns the supplied fields that were not part of the schema.
    #[must_use]
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Returns the classified category, if a call-type token was supplied.
    #[must_use]
    pub const fn category(&self) -> Option<CallCategory> {
        self.category
    }

    /// Returns `true` if no column was defaulted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.defaulted.is_empty()
    }
}

impl AlignedBatch {
    /// Returns the schema every row is aligned to.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Returns the aligned rows.
    #[must_use]
    pub fn rows(&self) -> &[AlignedRecord] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the batch has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row-major value matrix.
    #[must_use]
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.values.clone()).collect()
    }

    /// Returns how many rows defaulted each column, for columns defaulted at
    /// least once.
    #[must_use]
    pub fn defaulted_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for name in self.rows.iter().flat_map(|r| r.defaulted.iter()) {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use urgency_call_models::features::{
        DISPATCH_RESPONSE_SECONDS, HOUR, INCIDENT_DURATION, INCIDENT_RESPONSE_SECONDS, YEAR,
    };

    use super::*;

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(CategoryTables::builtin())
    }

    #[test]
    fn defaults_missing_columns_and_reports_them() {
        let schema = FeatureSchema::new(["A", "B", "C"]).unwrap();
        let raw = RawCallRecord::new().with_field("A", 1.0).with_field("B", 2.0);

        let record = builder().build(&raw, &schema).unwrap();
        assert_eq!(record.columns(), ["A", "B", "C"]);
        assert_eq!(record.values(), [1.0, 2.0, DEFAULT_FILL_VALUE]);
        assert_eq!(record.defaulted(), ["C"]);
        assert!(!record.is_complete());
    }

    #[test]
    fn reorders_to_schema_and_drops_extras() {
        let schema = FeatureSchema::new(["B", "A"]).unwrap();
        let raw = RawCallRecord::new()
            .with_field("A", 1.0)
            .with_field("B", 2.0)
            .with_field("NOTES", "free text");

        let record = builder().build(&raw, &schema).unwrap();
        assert_eq!(record.values(), [2.0, 1.0]);
        assert_eq!(record.dropped(), ["NOTES"]);
        assert!(record.is_complete());
    }

    #[test]
    fn complete_input_is_reproduced_unchanged() {
        let schema = FeatureSchema::default_layout();
        let mut raw = RawCallRecord::new();
        for (i, name) in schema.names().iter().enumerate() {
            raw = raw.with_field(name.clone(), f64::from(u8::try_from(i).unwrap()) * 10.5);
        }

        let record = builder().build(&raw, &schema).unwrap();
        assert!(record.defaulted().is_empty());
        for (i, (name, value)) in record.iter().enumerate() {
            assert_eq!(Some(value), raw.fields()[name].as_number(), "{name}");
            assert_eq!(record.columns()[i], name);
        }
    }

    #[test]
    fn custom_default_value_is_used() {
        let schema = FeatureSchema::new(["A"]).unwrap();
        let record = builder()
            .with_default_value(-1.0)
            .build(&RawCallRecord::new(), &schema)
            .unwrap();
        assert_eq!(record.values(), [-1.0]);
        assert_eq!(record.defaulted(), ["A"]);
    }

    #[test]
    fn derives_features_from_datetimes() {
        let schema =
            FeatureSchema::new([INCIDENT_DURATION, DISPATCH_RESPONSE_SECONDS, HOUR, YEAR]).unwrap();
        let raw = RawCallRecord::new()
            .with_incident_datetime("2025-03-31 14:30:00")
            .with_close_datetime("2025-03-31 15:00:00")
            .with_first_assignment_datetime("2025-03-31 14:35:00");

        let record = builder().build(&raw, &schema).unwrap();
        assert_eq!(record.values(), [1800.0, 300.0, 14.0, 2025.0]);
        assert!(record.is_complete());
    }

    #[test]
    fn direct_fields_override_derived_values() {
        let schema = FeatureSchema::new([HOUR]).unwrap();
        let raw = RawCallRecord::new()
            .with_incident_datetime("2025-03-31 14:30:00")
            .with_field(HOUR, 9.0);

        let record = builder().build(&raw, &schema).unwrap();
        assert_eq!(record.get(HOUR), Some(9.0));
    }

    #[test]
    fn encodes_call_category() {
        let schema = FeatureSchema::new([CALL_CATEGORY_ENCODED]).unwrap();

        let traffic = builder()
            .build(&RawCallRecord::new().with_call_type("MVA"), &schema)
            .unwrap();
        assert_eq!(traffic.category(), Some(CallCategory::Traffic));
        assert_eq!(traffic.get(CALL_CATEGORY_ENCODED), Some(5.0));

        let unknown = builder()
            .build(&RawCallRecord::new().with_call_type("ZZZZZ"), &schema)
            .unwrap();
        assert_eq!(unknown.category(), Some(CallCategory::Other));
        assert_eq!(unknown.get(CALL_CATEGORY_ENCODED), Some(4.0));
    }

    #[test]
    fn missing_call_type_defaults_the_encoded_column() {
        let schema = FeatureSchema::new([CALL_CATEGORY_ENCODED]).unwrap();
        let record = builder().build(&RawCallRecord::new(), &schema).unwrap();
        assert_eq!(record.category(), None);
        assert_eq!(record.defaulted(), [CALL_CATEGORY_ENCODED]);
    }

    #[test]
    fn non_numeric_values_are_reported_per_column() {
        let schema = FeatureSchema::new([YEAR, INCIDENT_RESPONSE_SECONDS, "A"]).unwrap();
        let raw = RawCallRecord::new()
            .with_field(YEAR, "next year")
            .with_field(INCIDENT_RESPONSE_SECONDS, "")
            .with_field("A", "3");

        let err = builder().build(&raw, &schema).unwrap_err();
        match err {
            FeatureError::TypeMismatch { mismatches } => {
                let columns: Vec<&str> = mismatches.iter().map(|m| m.column.as_str()).collect();
                assert_eq!(columns, [YEAR, INCIDENT_RESPONSE_SECONDS]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn readable_category_is_not_numeric() {
        let schema = FeatureSchema::new([CALL_CATEGORY]).unwrap();
        let err = builder()
            .build(&RawCallRecord::new().with_call_type("MVA"), &schema)
            .unwrap_err();
        assert!(matches!(err, FeatureError::TypeMismatch { .. }));
    }

    #[test]
    fn malformed_datetime_is_a_parse_error() {
        let schema = FeatureSchema::new(["A"]).unwrap();
        let raw = RawCallRecord::new().with_incident_datetime("31/03/2025");
        let err = builder().build(&raw, &schema).unwrap_err();
        assert!(matches!(err, FeatureError::Parse { .. }));
    }

    #[test]
    fn batch_applies_row_semantics_and_numbers_failures() {
        let schema = FeatureSchema::new(["A", "B"]).unwrap();
        let rows = vec![
            RawCallRecord::new().with_field("A", "1").with_field("B", "2"),
            RawCallRecord::new().with_field("A", "3"),
        ];

        let batch = builder().build_batch(&rows, &schema).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.matrix(), vec![vec![1.0, 2.0], vec![3.0, 0.0]]);
        assert_eq!(batch.defaulted_counts().get("B"), Some(&1));

        let bad = vec![
            RawCallRecord::new().with_field("A", "1"),
            RawCallRecord::new().with_field("A", "x"),
        ];
        let err = builder().build_batch(&bad, &schema).unwrap_err();
        assert!(matches!(err, FeatureError::Row { row: 2, .. }));
    }
}
