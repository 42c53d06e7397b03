#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only loaders for the externally trained inference artifacts.
//!
//! Three artifacts are supplied at startup and never written:
//!
//! 1. a fitted scaler ([`Scaler`], implemented by
//!    [`scaler::StandardScaler`]);
//! 2. a trained classifier ([`Classifier`], implemented by
//!    [`model::ModelArtifact`]);
//! 3. optionally, the ordered feature-name list both were trained on.
//!
//! [`bundle::ArtifactBundle`] loads all three, resolves the feature schema
//! and checks that every artifact agrees on its width. Any failure here is
//! fatal to the process.

pub mod bundle;
pub mod model;
pub mod scaler;

use std::path::{Path, PathBuf};

use urgency_features::FeatureError;

pub use bundle::{ArtifactBundle, ArtifactPaths, SchemaSource};
pub use model::ModelArtifact;
pub use scaler::StandardScaler;

/// Errors that can occur while loading or applying artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// An artifact file could not be read.
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        /// Path of the artifact.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// An artifact file is not valid JSON for its artifact type.
    #[error("Invalid artifact {}: {source}", .path.display())]
    Json {
        /// Path of the artifact.
        path: PathBuf,
        /// The underlying parse failure.
        source: serde_json::Error,
    },

    /// An artifact parsed but its contents are inconsistent.
    #[error("Malformed {artifact}: {message}")]
    Malformed {
        /// Which artifact (e.g. `"scaler"`).
        artifact: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// An input matrix row has the wrong width for an artifact.
    #[error("{artifact} expects {expected} features per row, got {actual}")]
    Shape {
        /// Which artifact (e.g. `"model"`).
        artifact: &'static str,
        /// Width the artifact was fitted on.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },

    /// The resolved feature schema is unusable or disagrees with an
    /// artifact.
    #[error(transparent)]
    Schema(#[from] FeatureError),
}

/// A fitted feature scaler with a fixed input width and column order.
pub trait Scaler: Send + Sync + std::fmt::Debug {
    /// Returns the number of columns the scaler was fitted on.
    fn n_features(&self) -> usize;

    /// Returns the column names recorded at fit time, if any.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Scales a row-major matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Shape`] if any row has the wrong width.
    fn transform(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ArtifactError>;
}

/// A trained classifier producing one integer class per input row.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Returns the number of columns the classifier was trained on.
    fn n_features(&self) -> usize;

    /// Predicts one class per row of a row-major matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Shape`] if any row has the wrong width.
    fn predict(&self, matrix: &[Vec<f64>]) -> Result<Vec<i64>, ArtifactError>;
}

/// Checks every row of `matrix` against the width an artifact expects.
pub(crate) fn check_rows(
    artifact: &'static str,
    expected: usize,
    matrix: &[Vec<f64>],
) -> Result<(), ArtifactError> {
    match matrix.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ArtifactError::Shape {
            artifact,
            expected,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}

/// Reads and deserializes a JSON artifact.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let file = std::fs::File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}
