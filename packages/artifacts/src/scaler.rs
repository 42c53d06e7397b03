//! Standard (z-score) scaler artifact.
//!
//! The JSON export carries the fitted per-column mean and scale, using
//! either plain names or scikit-learn's attribute names:
//!
//! ```json
//! {
//!   "mean_": [120.0, 540.0],
//!   "scale_": [60.0, 180.0],
//!   "feature_names_in_": ["DISPATCH_RESPONSE_SECONDS_QY", "INCIDENT_RESPONSE_SECONDS_QY"]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::{ArtifactError, Scaler, check_rows, read_json};

/// Column-wise `(x - mean) / scale` transform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StandardScaler {
    /// Fitted per-column means.
    #[serde(alias = "mean_")]
    mean: Vec<f64>,
    /// Fitted per-column scales.
    #[serde(alias = "scale_")]
    scale: Vec<f64>,
    /// Column names recorded at fit time.
    #[serde(default, alias = "feature_names_in_")]
    feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    /// Creates a scaler from fitted parameters.
    ///
    /// A zero scale (a constant column at fit time) is treated as 1 so the
    /// column is only centered.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Malformed`] if the parameters are empty,
    /// have different lengths, or contain non-finite values, or if recorded
    /// feature names do not match the width.
    pub fn new(
        mean: Vec<f64>,
        scale: Vec<f64>,
        feature_names: Option<Vec<String>>,
    ) -> Result<Self, ArtifactError> {
        let malformed = |message: String| ArtifactError::Malformed {
            artifact: "scaler",
            message,
        };

        if mean.is_empty() {
            return Err(malformed("no fitted columns".to_owned()));
        }
        if mean.len() != scale.len() {
            return Err(malformed(format!(
                "{} means but {} scales",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err(malformed("non-finite mean or scale".to_owned()));
        }
        if let Some(names) = &feature_names
            && names.len() != mean.len()
        {
            return Err(malformed(format!(
                "{} feature names for {} columns",
                names.len(),
                mean.len()
            )));
        }

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            mean,
            scale,
            feature_names,
        })
    }

    /// Loads a scaler from a JSON export.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if the file cannot be read or parsed, or
    /// its parameters are inconsistent.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw: Self = read_json(path)?;
        let scaler = Self::new(raw.mean, raw.scale, raw.feature_names)?;
        log::info!(
            "Loaded standard scaler with {} columns from {}",
            scaler.mean.len(),
            path.display()
        );
        Ok(scaler)
    }
}

impl Scaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn transform(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ArtifactError> {
        check_rows("scaler", self.mean.len(), matrix)?;

        Ok(matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (mean, scale))| (x - mean) / scale)
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_each_column() {
        let scaler = StandardScaler::new(vec![10.0, 0.0], vec![2.0, 4.0], None).unwrap();
        let out = scaler.transform(&[vec![14.0, -8.0], vec![10.0, 4.0]]).unwrap();
        assert_eq!(out, vec![vec![2.0, -2.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn zero_scale_only_centers() {
        let scaler = StandardScaler::new(vec![5.0], vec![0.0], None).unwrap();
        assert_eq!(scaler.transform(&[vec![7.0]]).unwrap(), vec![vec![2.0]]);
    }

    #[test]
    fn rejects_wrong_width() {
        let scaler = StandardScaler::new(vec![0.0, 0.0], vec![1.0, 1.0], None).unwrap();
        let err = scaler.transform(&[vec![1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Shape {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_inconsistent_parameters() {
        assert!(StandardScaler::new(vec![], vec![], None).is_err());
        assert!(StandardScaler::new(vec![0.0, 1.0], vec![1.0], None).is_err());
        assert!(StandardScaler::new(vec![f64::NAN], vec![1.0], None).is_err());
        assert!(StandardScaler::new(vec![0.0], vec![1.0], Some(vec![])).is_err());
    }

    #[test]
    fn deserializes_sklearn_attribute_names() {
        let raw: StandardScaler = serde_json::from_value(serde_json::json!({
            "mean_": [1.0, 2.0],
            "scale_": [3.0, 4.0],
            "feature_names_in_": ["A", "B"]
        }))
        .unwrap();
        let scaler = StandardScaler::new(raw.mean, raw.scale, raw.feature_names).unwrap();
        assert_eq!(scaler.n_features(), 2);
        assert_eq!(scaler.feature_names().unwrap(), ["A", "B"]);
    }
}
