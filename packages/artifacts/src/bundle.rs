//! Loads every artifact at startup and settles on one feature schema.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};
use urgency_features::FeatureSchema;

use crate::{ArtifactError, Classifier, ModelArtifact, Scaler, StandardScaler, read_json};

/// Where each artifact lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactPaths {
    /// Trained classifier export.
    pub model: PathBuf,
    /// Fitted scaler export.
    pub scaler: PathBuf,
    /// Ordered feature-name list, if exported separately.
    #[serde(default)]
    pub feature_names: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Resolves relative paths against `base` (usually the directory of the
    /// config file that named them).
    #[must_use]
    pub fn resolve_against(mut self, base: &Path) -> Self {
        let resolve = |path: PathBuf| {
            if path.is_relative() {
                base.join(path)
            } else {
                path
            }
        };
        self.model = resolve(self.model);
        self.scaler = resolve(self.scaler);
        self.feature_names = self.feature_names.map(resolve);
        self
    }
}

/// Where the resolved feature schema came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SchemaSource {
    /// The explicit feature-name artifact.
    FeatureNames,
    /// Column names recorded by the scaler at fit time.
    Scaler,
    /// The `[schema] features` list of the config file.
    Config,
    /// The built-in six-column layout.
    Default,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureNamesFile {
    List(Vec<String>),
    Object { feature_names: Vec<String> },
}

/// Loads an ordered feature-name list. Accepts either a bare JSON array or
/// an object with a `feature_names` array.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be read or parsed, or the
/// list is not a valid schema.
pub fn load_feature_names(path: &Path) -> Result<FeatureSchema, ArtifactError> {
    let names = match read_json(path)? {
        FeatureNamesFile::List(names) | FeatureNamesFile::Object { feature_names: names } => names,
    };
    Ok(FeatureSchema::new(names)?)
}

/// Picks the schema from the first available source, in order: feature-name
/// artifact, scaler-recorded names, config list, built-in layout.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the chosen source is not a valid schema.
pub fn resolve_schema(
    feature_names: Option<&Path>,
    scaler: &dyn Scaler,
    configured: Option<&[String]>,
) -> Result<(FeatureSchema, SchemaSource), ArtifactError> {
    if let Some(path) = feature_names {
        return Ok((load_feature_names(path)?, SchemaSource::FeatureNames));
    }
    if let Some(names) = scaler.feature_names() {
        return Ok((FeatureSchema::new(names.iter().cloned())?, SchemaSource::Scaler));
    }
    if let Some(names) = configured {
        return Ok((FeatureSchema::new(names.iter().cloned())?, SchemaSource::Config));
    }
    Ok((FeatureSchema::default_layout(), SchemaSource::Default))
}

/// The loaded, mutually consistent artifact set. Read-only after
/// construction.
#[derive(Debug)]
pub struct ArtifactBundle {
    model: Box<dyn Classifier>,
    scaler: Box<dyn Scaler>,
    schema: FeatureSchema,
    schema_source: SchemaSource,
}

impl ArtifactBundle {
    /// Loads the model, scaler and schema from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if any artifact fails to load, or the
    /// artifacts disagree on the feature width.
    pub fn load(
        paths: &ArtifactPaths,
        configured_schema: Option<&[String]>,
    ) -> Result<Self, ArtifactError> {
        let scaler = StandardScaler::load(&paths.scaler)?;
        let model = ModelArtifact::load(&paths.model)?;
        let (schema, source) =
            resolve_schema(paths.feature_names.as_deref(), &scaler, configured_schema)?;

        Self::new(Box::new(model), Box::new(scaler), schema, source)
    }

    /// Assembles a bundle from already-loaded parts.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Schema`] if the scaler or the model was
    /// fitted on a different number of features than the schema lists, or
    /// the scaler recorded its column names in a different order.
    pub fn new(
        model: Box<dyn Classifier>,
        scaler: Box<dyn Scaler>,
        schema: FeatureSchema,
        schema_source: SchemaSource,
    ) -> Result<Self, ArtifactError> {
        schema.check_width("scaler", scaler.n_features(), scaler.feature_names())?;
        if let Some(names) = scaler.feature_names() {
            schema.check_order("scaler", names)?;
        }
        schema.check_width("model", model.n_features(), None)?;

        log::info!(
            "Using {} feature schema from {schema_source}: {schema}",
            schema.len()
        );

        Ok(Self {
            model,
            scaler,
            schema,
            schema_source,
        })
    }

    /// Returns the classifier.
    #[must_use]
    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    /// Returns the scaler.
    #[must_use]
    pub fn scaler(&self) -> &dyn Scaler {
        self.scaler.as_ref()
    }

    /// Returns the resolved feature schema.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Returns where the schema came from.
    #[must_use]
    pub const fn schema_source(&self) -> SchemaSource {
        self.schema_source
    }

    /// Scales `matrix` and classifies every row.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Shape`] if any row has the wrong width.
    pub fn predict(&self, matrix: &[Vec<f64>]) -> Result<Vec<i64>, ArtifactError> {
        let scaled = self.scaler.transform(matrix)?;
        self.model.predict(&scaled)
    }
}
