//! `urgency.toml` configuration.
//!
//! ```toml
//! [artifacts]
//! model = "artifacts/model.json"
//! scaler = "artifacts/scaler.json"
//! feature_names = "artifacts/feature_names.json"   # optional
//! categories = "categories.toml"                   # optional override
//!
//! [schema]
//! features = ["DISPATCH_RESPONSE_SECONDS_QY", "YEAR"]   # optional fallback
//!
//! [labels]
//! names = ["Low Urgency", "Medium Urgency", "High Urgency"]
//! unknown = "Unknown"
//!
//! [input]
//! call_type = "INITIAL_CALL_TYPE"
//!
//! [builder]
//! default_value = 0.0
//!
//! [batch]
//! prediction_column = "Predicted Urgency"
//! delimiter = ","
//! ```
//!
//! Only `[artifacts]` is required. Relative paths resolve against the
//! directory containing the config file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use urgency_artifacts::ArtifactPaths;
use urgency_call_models::{InputColumns, UrgencyLabels};
use urgency_features::CategoryTables;
use urgency_features::builder::DEFAULT_FILL_VALUE;

use crate::PredictError;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "URGENCY_CONFIG";

/// Config file used when neither a flag nor [`CONFIG_ENV_VAR`] names one.
pub const DEFAULT_CONFIG_FILE: &str = "urgency.toml";

/// Default name of the column appended to batch output.
pub const DEFAULT_PREDICTION_COLUMN: &str = "Predicted Urgency";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Artifact locations.
    pub artifacts: ArtifactsConfig,
    /// Fallback schema.
    #[serde(default)]
    pub schema: SchemaConfig,
    /// Class index to label table.
    #[serde(default)]
    pub labels: UrgencyLabels,
    /// Names of the non-feature input columns of uploaded tables.
    #[serde(default)]
    pub input: InputColumns,
    /// Feature builder settings.
    #[serde(default)]
    pub builder: BuilderConfig,
    /// Batch prediction settings.
    #[serde(default)]
    pub batch: BatchConfig,
}

/// `[artifacts]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactsConfig {
    /// Model, scaler and feature-name paths.
    #[serde(flatten)]
    pub paths: ArtifactPaths,
    /// Category table override. The built-in tables are used when unset.
    #[serde(default)]
    pub categories: Option<PathBuf>,
}

/// `[schema]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SchemaConfig {
    /// Ordered feature names, used only when neither the feature-name
    /// artifact nor the scaler records them.
    #[serde(default)]
    pub features: Option<Vec<String>>,
}

/// `[builder]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuilderConfig {
    /// Value given to schema columns the input does not supply.
    #[serde(default = "default_fill_value")]
    pub default_value: f64,
}

const fn default_fill_value() -> f64 {
    DEFAULT_FILL_VALUE
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            default_value: default_fill_value(),
        }
    }
}

/// `[batch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchConfig {
    /// Columns an uploaded table must carry. Defaults to the resolved
    /// schema.
    #[serde(default)]
    pub required_columns: Option<Vec<String>>,
    /// Name of the appended prediction column.
    #[serde(default = "default_prediction_column")]
    pub prediction_column: String,
    /// Field delimiter of uploaded and written tables.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_prediction_column() -> String {
    DEFAULT_PREDICTION_COLUMN.to_owned()
}

const fn default_delimiter() -> char {
    ','
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            required_columns: None,
            prediction_column: default_prediction_column(),
            delimiter: default_delimiter(),
        }
    }
}

impl BatchConfig {
    /// Returns the delimiter as a byte.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::InvalidConfig`] if the delimiter is not a
    /// single ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8, PredictError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                PredictError::InvalidConfig(format!(
                    "batch delimiter {:?} is not an ASCII character",
                    self.delimiter
                ))
            })
    }
}

impl AppConfig {
    /// Parses a config from TOML text. Relative paths are left as written.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::Toml`] if the text is not a valid config.
    pub fn from_toml_str(toml_str: &str, origin: &Path) -> Result<Self, PredictError> {
        let config: Self = toml::de::from_str(toml_str).map_err(|source| PredictError::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.batch.delimiter_byte()?;

        if config.labels.is_empty() {
            log::warn!("No urgency labels configured; every prediction will be unknown");
        }

        Ok(config)
    }

    /// Loads a config file and resolves its relative paths against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::Io`] if the file cannot be read, or any error
    /// from [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, PredictError> {
        let text = std::fs::read_to_string(path).map_err(|source| PredictError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml_str(&text, path)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads the category override if one is configured, otherwise returns
    /// the built-in tables.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError`] if the override cannot be read or is
    /// inconsistent.
    pub fn category_tables(&self) -> Result<CategoryTables, PredictError> {
        let Some(path) = &self.artifacts.categories else {
            return Ok(CategoryTables::builtin());
        };

        let text = std::fs::read_to_string(path).map_err(|source| PredictError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("Loading category tables from {}", path.display());
        Ok(CategoryTables::from_toml_str(&text)?)
    }

    /// Resolves relative artifact paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.artifacts.paths = self.artifacts.paths.clone().resolve_against(base);
        if let Some(categories) = &self.artifacts.categories
            && categories.is_relative()
        {
            self.artifacts.categories = Some(base.join(categories));
        }
    }
}

/// Picks the config file: the explicit path if given, otherwise
/// [`CONFIG_ENV_VAR`], otherwise [`DEFAULT_CONFIG_FILE`] in the working
/// directory.
#[must_use]
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[artifacts]
model = "model.json"
scaler = "scaler.json"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL, Path::new("urgency.toml")).unwrap();
        assert_eq!(config.artifacts.paths.model, Path::new("model.json"));
        assert!(config.artifacts.paths.feature_names.is_none());
        assert!(config.artifacts.categories.is_none());
        assert!(config.schema.features.is_none());
        assert_eq!(config.labels, UrgencyLabels::default());
        assert_eq!(config.input, InputColumns::default());
        assert!(config.builder.default_value.abs() < f64::EPSILON);
        assert_eq!(config.batch.prediction_column, "Predicted Urgency");
        assert_eq!(config.batch.delimiter_byte().unwrap(), b',');
    }

    #[test]
    fn reads_every_section() {
        let toml_str = r#"
[artifacts]
model = "m.json"
scaler = "s.json"
feature_names = "names.json"
categories = "/etc/urgency/categories.toml"

[schema]
features = ["YEAR", "HOUR"]

[labels]
names = ["Routine", "Urgent"]
unknown = "?"

[input]
call_type = "CALL_TYPE"

[builder]
default_value = -1.0

[batch]
required_columns = ["YEAR"]
prediction_column = "Urgency"
delimiter = ";"
"#;
        let mut config = AppConfig::from_toml_str(toml_str, Path::new("urgency.toml")).unwrap();
        config.resolve_paths(Path::new("/srv/urgency"));

        assert_eq!(config.artifacts.paths.model, Path::new("/srv/urgency/m.json"));
        assert_eq!(
            config.artifacts.paths.feature_names.as_deref(),
            Some(Path::new("/srv/urgency/names.json"))
        );
        assert_eq!(
            config.artifacts.categories.as_deref(),
            Some(Path::new("/etc/urgency/categories.toml"))
        );
        assert_eq!(config.schema.features.unwrap(), ["YEAR", "HOUR"]);
        assert_eq!(config.labels.resolve(1), "Urgent");
        assert_eq!(config.labels.resolve(2), "?");
        assert_eq!(config.input.call_type, "CALL_TYPE");
        assert_eq!(config.input.incident_datetime, "INCIDENT_DATETIME");
        assert!((config.builder.default_value + 1.0).abs() < f64::EPSILON);
        assert_eq!(config.batch.required_columns.unwrap(), ["YEAR"]);
        assert_eq!(config.batch.prediction_column, "Urgency");
        assert_eq!(config.batch.delimiter, ';');
    }

    #[test]
    fn rejects_missing_artifacts_and_bad_delimiter() {
        assert!(matches!(
            AppConfig::from_toml_str("", Path::new("urgency.toml")),
            Err(PredictError::Toml { .. })
        ));

        let bad = format!("{MINIMAL}\n[batch]\ndelimiter = \"\u{e9}\"\n");
        assert!(matches!(
            AppConfig::from_toml_str(&bad, Path::new("urgency.toml")),
            Err(PredictError::InvalidConfig(_))
        ));
    }

    #[test]
    fn explicit_config_path_wins() {
        assert_eq!(
            config_path(Some(PathBuf::from("/tmp/custom.toml"))),
            Path::new("/tmp/custom.toml")
        );
    }
}
