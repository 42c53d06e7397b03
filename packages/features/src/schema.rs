//! The ordered feature list a trained model expects.

use std::collections::BTreeSet;
use std::sync::Arc;

use urgency_call_models::features::DEFAULT_SCHEMA;

use crate::FeatureError;

/// Ordered, non-empty, duplicate-free feature names.
///
/// Loaded from an artifact (never computed) and treated as the single
/// source of truth for output width and column order. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Arc<[String]>,
}

impl FeatureSchema {
    /// Creates a schema from an ordered list of feature names.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Configuration`] if the list is empty or
    /// contains blank or duplicate names.
    pub fn new<I, S>(names: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        if names.is_empty() {
            return Err(FeatureError::configuration(
                "expected feature schema is empty",
            ));
        }

        let duplicates: Vec<String> = {
            let mut seen = BTreeSet::new();
            names
                .iter()
                .filter(|name| !seen.insert(name.as_str()))
                .cloned()
                .collect()
        };
        if !duplicates.is_empty() {
            return Err(FeatureError::configuration(format!(
                "duplicate feature names in schema: {}",
                duplicates.join(", ")
            )));
        }

        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(FeatureError::Configuration {
                message: "feature schema contains a blank name".to_owned(),
                expected: Vec::new(),
                actual: names,
            });
        }

        Ok(Self {
            names: names.into(),
        })
    }

    /// Returns the built-in six-column layout used when no schema artifact
    /// is configured.
    #[must_use]
    pub fn default_layout() -> Self {
        Self {
            names: DEFAULT_SCHEMA.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Returns the feature names in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always `false`: an empty schema cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns `true` if the schema contains `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the column index of `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Checks that an artifact expecting `width` columns agrees with this
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Configuration`] with the schema as the actual
    /// list if the widths differ. `expected_names` (when the artifact
    /// records them) is reported as the expected list.
    pub fn check_width(
        &self,
        artifact: &str,
        width: usize,
        expected_names: Option<&[String]>,
    ) -> Result<(), FeatureError> {
        if width == self.len() {
            return Ok(());
        }
        Err(FeatureError::Configuration {
            message: format!(
                "{artifact} expects {width} features but the schema has {}",
                self.len()
            ),
            expected: expected_names.map(<[String]>::to_vec).unwrap_or_default(),
            actual: self.names.to_vec(),
        })
    }

    /// Checks that an artifact which recorded its training column names
    /// lists exactly this schema, in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Configuration`] with the artifact's names as
    /// the expected list and the schema as the actual list if they differ
    /// in content or order.
    pub fn check_order(
        &self,
        artifact: &str,
        expected_names: &[String],
    ) -> Result<(), FeatureError> {
        if *self.names == *expected_names {
            return Ok(());
        }
        Err(FeatureError::Configuration {
            message: format!("{artifact} was fitted on a different column order than the schema"),
            expected: expected_names.to_vec(),
            actual: self.names.to_vec(),
        })
    }
}

impl std::fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}
