#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end urgency prediction.
//!
//! [`Predictor`] owns everything loaded at startup (category tables,
//! artifacts, labels, config) and runs the pipeline:
//!
//! raw input → feature builder → aligned row → scaler → model → class →
//! label
//!
//! for one manually entered record ([`Predictor::predict_one`]) or for every
//! row of an uploaded table ([`Predictor::predict_table`]). Nothing is
//! mutated after construction.

pub mod config;
pub mod progress;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use urgency_artifacts::{ArtifactBundle, ArtifactError};
use urgency_call_models::features::check_manual_range;
use urgency_call_models::{InputColumns, RawCallRecord, UrgencyLabels};
use urgency_features::{
    AlignedRecord, FeatureBuilder, FeatureError, FeatureSchema, Table, reconcile_batch,
};

use crate::config::{AppConfig, BatchConfig};
use crate::progress::ProgressCallback;

pub use urgency_artifacts::SchemaSource;

/// Rows built, scaled and classified together on the batch path.
pub const BATCH_CHUNK_SIZE: usize = 1000;

/// Errors that can occur while configuring or running predictions.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// Feature reconstruction failed.
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// An artifact failed to load or rejected its input.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// A config or category file could not be read.
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// A config file is not valid TOML for [`AppConfig`].
    #[error("Invalid config {}: {source}", .path.display())]
    Toml {
        /// Path of the config file.
        path: PathBuf,
        /// The underlying parse failure.
        source: toml::de::Error,
    },

    /// A config value parsed but is unusable.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl PredictError {
    /// Returns `true` if the error stems from user input that the user can
    /// fix and retry, as opposed to a broken deployment.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Feature(e) => e.is_user_error(),
            Self::Artifact(_) | Self::Io { .. } | Self::Toml { .. } | Self::InvalidConfig(_) => {
                false
            }
        }
    }
}

/// Outcome of one manual prediction.
#[derive(Debug, Clone)]
pub struct Prediction {
    class: i64,
    label: String,
    record: AlignedRecord,
}

impl Prediction {
    /// Returns the class emitted by the model.
    #[must_use]
    pub const fn class(&self) -> i64 {
        self.class
    }

    /// Returns the resolved urgency label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the aligned, unscaled feature row the model saw.
    #[must_use]
    pub const fn record(&self) -> &AlignedRecord {
        &self.record
    }

    /// Returns the schema columns that were filled with the default value.
    #[must_use]
    pub fn defaulted(&self) -> &[String] {
        self.record.defaulted()
    }
}

/// Outcome of a batch prediction.
#[derive(Debug, Clone)]
pub struct BatchPredictions {
    /// The input table with the prediction column appended.
    pub table: Table,
    /// Number of rows per label, in label order of first appearance.
    pub label_counts: Vec<(String, usize)>,
    /// Number of rows each schema column was defaulted in.
    pub defaulted_counts: BTreeMap<String, usize>,
}

/// Rejects manually entered values outside the ranges the entry form
/// accepts.
///
/// # Errors
///
/// Returns [`FeatureError::Parse`] for the first out-of-range field.
pub fn check_manual_fields(raw: &RawCallRecord) -> Result<(), FeatureError> {
    for (name, value) in raw.fields() {
        if let Some(number) = value.as_number() {
            check_manual_range(name, number).map_err(|e| FeatureError::Parse {
                field: e.field,
                value: value.to_string(),
                message: format!("expected {}", e.expected),
            })?;
        }
    }
    Ok(())
}

/// Loaded, read-only prediction pipeline.
#[derive(Debug)]
pub struct Predictor {
    builder: FeatureBuilder,
    bundle: ArtifactBundle,
    labels: UrgencyLabels,
    input: InputColumns,
    batch: BatchConfig,
}

impl Predictor {
    /// Creates a predictor with default input columns and batch settings.
    #[must_use]
    pub fn new(builder: FeatureBuilder, bundle: ArtifactBundle, labels: UrgencyLabels) -> Self {
        Self {
            builder,
            bundle,
            labels,
            input: InputColumns::default(),
            batch: BatchConfig::default(),
        }
    }

    /// Sets the names of the non-feature input columns.
    #[must_use]
    pub fn with_input_columns(mut self, input: InputColumns) -> Self {
        self.input = input;
        self
    }

    /// Sets the batch settings.
    #[must_use]
    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Loads the category tables and artifacts named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError`] if the category override or any artifact
    /// fails to load, or the artifacts disagree on the feature width.
    pub fn from_config(config: &AppConfig) -> Result<Self, PredictError> {
        let tables = config.category_tables()?;
        let bundle =
            ArtifactBundle::load(&config.artifacts.paths, config.schema.features.as_deref())?;
        let builder = FeatureBuilder::new(tables).with_default_value(config.builder.default_value);

        Ok(Self::new(builder, bundle, config.labels.clone())
            .with_input_columns(config.input.clone())
            .with_batch_config(config.batch.clone()))
    }

    /// Returns the resolved feature schema.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        self.bundle.schema()
    }

    /// Returns where the schema came from.
    #[must_use]
    pub const fn schema_source(&self) -> SchemaSource {
        self.bundle.schema_source()
    }

    /// Returns the feature builder.
    #[must_use]
    pub const fn builder(&self) -> &FeatureBuilder {
        &self.builder
    }

    /// Returns the label table.
    #[must_use]
    pub const fn labels(&self) -> &UrgencyLabels {
        &self.labels
    }

    /// Returns the batch settings.
    #[must_use]
    pub const fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// Returns the columns an uploaded table must carry.
    #[must_use]
    pub fn required_columns(&self) -> &[String] {
        self.batch
            .required_columns
            .as_deref()
            .unwrap_or_else(|| self.schema().names())
    }

    /// Predicts the urgency of one manually entered record.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::Feature`] if the record cannot be turned into
    /// a feature row, or [`PredictError::Artifact`] if the artifacts reject
    /// it. No partial result is returned.
    pub fn predict_one(&self, raw: &RawCallRecord) -> Result<Prediction, PredictError> {
        let record = self.builder.build(raw, self.schema())?;

        for name in record.defaulted() {
            log::warn!(
                "{name} was not supplied; using default value {}",
                self.builder.default_value()
            );
        }

        let classes = self.bundle.predict(&[record.values().to_vec()])?;
        let class = classes.first().copied().ok_or_else(|| ArtifactError::Shape {
            artifact: "model",
            expected: 1,
            actual: 0,
        })?;
        let label = self.labels.resolve(class).to_owned();

        log::info!("Predicted class {class} ({label})");

        Ok(Prediction {
            class,
            label,
            record,
        })
    }

    /// Predicts every row of an uploaded table and appends the labels as
    /// the configured prediction column.
    ///
    /// The table must carry every required column; nothing is defaulted
    /// for missing columns.
    ///
    /// # Errors
    ///
    /// * [`FeatureError::SchemaMismatch`] naming every missing column.
    /// * [`FeatureError::Row`] for the first row that cannot be built.
    /// * [`PredictError::Artifact`] if the artifacts reject the rows.
    pub fn predict_table(
        &self,
        table: &Table,
        progress: Option<Arc<dyn ProgressCallback>>,
    ) -> Result<BatchPredictions, PredictError> {
        let progress = progress.unwrap_or_else(progress::null_progress);
        let table = reconcile_batch(table, self.required_columns())?;
        let records = table.records(&self.input);

        progress.set_total(records.len() as u64);
        progress.set_message("Predicting".to_owned());

        let mut labels = Vec::with_capacity(records.len());
        let mut defaulted_counts: BTreeMap<String, usize> = BTreeMap::new();

        for (chunk_index, chunk) in records.chunks(BATCH_CHUNK_SIZE).enumerate() {
            let offset = chunk_index * BATCH_CHUNK_SIZE;
            let batch = self
                .builder
                .build_batch(chunk, self.schema())
                .map_err(|e| offset_row(e, offset))?;

            for (name, count) in batch.defaulted_counts() {
                *defaulted_counts.entry(name).or_default() += count;
            }

            let classes = self.bundle.predict(&batch.matrix())?;
            labels.extend(classes.into_iter().map(|c| self.labels.resolve(c).to_owned()));
            progress.inc(chunk.len() as u64);
        }

        let mut label_counts: Vec<(String, usize)> = Vec::new();
        for label in &labels {
            match label_counts.iter_mut().find(|(l, _)| l == label) {
                Some((_, count)) => *count += 1,
                None => label_counts.push((label.clone(), 1)),
            }
        }

        let mut output = table.clone();
        output.set_column(&self.batch.prediction_column, labels)?;

        progress.finish(format!("Predicted {} rows", output.len()));
        log::info!(
            "Predicted {} rows into column {:?}",
            output.len(),
            self.batch.prediction_column
        );

        Ok(BatchPredictions {
            table: output,
            label_counts,
            defaulted_counts,
        })
    }
}

/// Shifts a chunk-relative row number to its position in the whole table.
fn offset_row(error: FeatureError, offset: usize) -> FeatureError {
    match error {
        FeatureError::Row { row, source } => FeatureError::Row {
            row: row + offset,
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use urgency_artifacts::model::LinearClassifier;
    use urgency_artifacts::{ModelArtifact, StandardScaler};
    use urgency_call_models::features::{CALL_CATEGORY_ENCODED, INCIDENT_DURATION, YEAR};
    use urgency_features::CategoryTables;

    use super::*;

    /// One feature (`INCIDENT_DURATION`) plus the encoded category.
    /// Long incidents are high urgency, zero-length ones medium.
    fn predictor() -> Predictor {
        let mut model = ModelArtifact::Linear(LinearClassifier {
            coefficients: vec![vec![-1.0, 0.0], vec![0.0, 0.0], vec![1.0, 0.0]],
            intercepts: vec![0.0, 0.5, 0.0],
            classes: Vec::new(),
        });
        model.validate().unwrap();

        let bundle = ArtifactBundle::new(
            Box::new(model),
            Box::new(StandardScaler::new(vec![0.0, 0.0], vec![100.0, 1.0], None).unwrap()),
            FeatureSchema::new([INCIDENT_DURATION, CALL_CATEGORY_ENCODED]).unwrap(),
            SchemaSource::Config,
        )
        .unwrap();

        Predictor::new(
            FeatureBuilder::new(CategoryTables::builtin()),
            bundle,
            UrgencyLabels::default(),
        )
    }

    #[test]
    fn predicts_from_derived_features() {
        let raw = RawCallRecord::new()
            .with_call_type("MVA")
            .with_incident_datetime("2025-03-31 14:30:00")
            .with_close_datetime("2025-03-31 15:00:00");

        let prediction = predictor().predict_one(&raw).unwrap();
        assert_eq!(prediction.class(), 2);
        assert_eq!(prediction.label(), "High Urgency");
        assert_eq!(prediction.record().get(INCIDENT_DURATION), Some(1800.0));
        assert!(prediction.defaulted().is_empty());
    }

    #[test]
    fn reports_defaulted_columns() {
        let raw = RawCallRecord::new().with_call_type("EDP");
        let prediction = predictor().predict_one(&raw).unwrap();
        assert_eq!(prediction.label(), "Medium Urgency");
        assert_eq!(prediction.defaulted(), [INCIDENT_DURATION]);
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let raw = RawCallRecord::new()
            .with_call_type("MVA")
            .with_field(INCIDENT_DURATION, "long");
        let err = predictor().predict_one(&raw).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Feature(FeatureError::TypeMismatch { .. })
        ));
        assert!(err.is_user_error());
    }

    #[test]
    fn manual_ranges_are_parse_errors() {
        let ok = RawCallRecord::new().with_field(YEAR, 2024.0);
        assert!(check_manual_fields(&ok).is_ok());

        let bad = RawCallRecord::new().with_field(YEAR, 1990.0);
        assert!(matches!(
            check_manual_fields(&bad),
            Err(FeatureError::Parse { field, .. }) if field == YEAR
        ));
    }

    #[test]
    fn appends_prediction_column() {
        let csv = "\
NOTES,INCIDENT_DURATION,CALL_CATEGORY_ENCODED
a,600,5
b,0,2
c,-900,1
";
        let table = Table::from_reader(csv.as_bytes(), b',').unwrap();
        let result = predictor().predict_table(&table, None).unwrap();

        assert_eq!(result.table.headers().last().unwrap(), "Predicted Urgency");
        let predicted: Vec<&str> = result
            .table
            .rows()
            .iter()
            .map(|row| row[3].as_str())
            .collect();
        assert_eq!(predicted, ["High Urgency", "Medium Urgency", "Low Urgency"]);
        assert_eq!(result.table.rows()[0][0], "a");
        assert_eq!(result.label_counts.len(), 3);
        assert!(result.defaulted_counts.is_empty());
    }

    #[test]
    fn batch_requires_every_schema_column() {
        let table = Table::from_reader("INCIDENT_DURATION\n60\n".as_bytes(), b',').unwrap();
        let err = predictor().predict_table(&table, None).unwrap_err();
        match err {
            PredictError::Feature(FeatureError::SchemaMismatch { missing }) => {
                assert_eq!(missing, [CALL_CATEGORY_ENCODED]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn batch_errors_name_the_row() {
        let table = Table::from_reader(
            "INCIDENT_DURATION,CALL_CATEGORY_ENCODED\n60,1\nabc,1\n".as_bytes(),
            b',',
        )
        .unwrap();
        let err = predictor().predict_table(&table, None).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Feature(FeatureError::Row { row: 2, .. })
        ));
    }

    #[test]
    fn offsets_chunk_relative_rows() {
        let err = FeatureError::Row {
            row: 3,
            source: Box::new(FeatureError::configuration("x")),
        };
        assert!(matches!(
            offset_row(err, BATCH_CHUNK_SIZE),
            FeatureError::Row { row: 1003, .. }
        ));
    }
}
