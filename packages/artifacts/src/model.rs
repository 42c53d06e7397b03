//! Trained classifier artifacts.
//!
//! Models are exported to JSON, tagged by `kind`:
//!
//! * `"linear"`: a multinomial linear classifier (one coefficient row and
//!   intercept per class, argmax of the decision function). A single row
//!   with two classes is the binary form, positive decision meaning the
//!   second class.
//! * `"gradient_boosting"`: an additive tree ensemble. Each boosting stage
//!   holds one regression tree per class; class scores start from `init`
//!   and accumulate `learning_rate * leaf value`. A single tree per stage
//!   with two classes is the binary form.
//!
//! Tree nodes split left when `x[feature] <= threshold`.

use std::path::Path;

use serde::Deserialize;

use crate::{ArtifactError, Classifier, check_rows, read_json};

/// A trained classifier loaded from JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Linear decision function per class.
    Linear(LinearClassifier),
    /// Gradient-boosted regression trees.
    GradientBoosting(GradientBoostingClassifier),
}

/// Multinomial (or binary) linear classifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearClassifier {
    /// One coefficient row per class (or a single row for the binary form).
    #[serde(alias = "coef_")]
    pub coefficients: Vec<Vec<f64>>,
    /// One intercept per coefficient row.
    #[serde(alias = "intercept_")]
    pub intercepts: Vec<f64>,
    /// Class labels emitted by the model. Defaults to `0..n`.
    #[serde(default, alias = "classes_")]
    pub classes: Vec<i64>,
}

/// Additive ensemble of regression trees, one per class per stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GradientBoostingClassifier {
    /// Number of input columns.
    pub n_features: usize,
    /// Class labels emitted by the model.
    pub classes: Vec<i64>,
    /// Shrinkage applied to every tree's output.
    pub learning_rate: f64,
    /// Initial raw score per tree slot (one per class, or one for binary).
    pub init: Vec<f64>,
    /// Boosting stages, each holding one tree per tree slot.
    pub stages: Vec<Vec<Tree>>,
}

/// A regression tree stored as a flat node list rooted at index 0.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tree {
    /// Nodes in depth-first order.
    pub nodes: Vec<TreeNode>,
}

/// One node of a [`Tree`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node.
    Split {
        /// Input column tested.
        feature: usize,
        /// Values `<=` threshold go left.
        threshold: f64,
        /// Index of the left child.
        left: usize,
        /// Index of the right child.
        right: usize,
    },
    /// Terminal node.
    Leaf {
        /// Raw score contributed by this leaf.
        value: f64,
    },
}

fn malformed(message: String) -> ArtifactError {
    ArtifactError::Malformed {
        artifact: "model",
        message,
    }
}

/// Index of the largest score; the first one wins ties.
fn argmax(scores: &[f64]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_score), (i, &score)| {
            if score > best_score {
                (i, score)
            } else {
                (best, best_score)
            }
        })
        .0
}

impl ModelArtifact {
    /// Loads and validates a model from a JSON export.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if the file cannot be read or parsed, or the
    /// model is internally inconsistent.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let mut model: Self = read_json(path)?;
        model.validate()?;
        log::info!(
            "Loaded {} model with {} features from {}",
            model.kind(),
            model.n_features(),
            path.display()
        );
        Ok(model)
    }

    /// Returns the artifact kind as written in the `kind` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::GradientBoosting(_) => "gradient_boosting",
        }
    }

    /// Checks internal consistency and fills defaulted class labels.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Malformed`] describing the first
    /// inconsistency.
    pub fn validate(&mut self) -> Result<(), ArtifactError> {
        match self {
            Self::Linear(model) => model.validate(),
            Self::GradientBoosting(model) => model.check(),
        }
    }

    /// Same checks as [`Self::validate`] without filling class labels.
    fn check(&self) -> Result<(), ArtifactError> {
        match self {
            Self::Linear(model) => model.check(),
            Self::GradientBoosting(model) => model.check(),
        }
    }
}

impl Classifier for ModelArtifact {
    fn n_features(&self) -> usize {
        match self {
            Self::Linear(model) => model.n_features(),
            Self::GradientBoosting(model) => model.n_features,
        }
    }

    fn predict(&self, matrix: &[Vec<f64>]) -> Result<Vec<i64>, ArtifactError> {
        self.check()?;
        check_rows("model", self.n_features(), matrix)?;
        Ok(match self {
            Self::Linear(model) => matrix.iter().map(|row| model.predict_row(row)).collect(),
            Self::GradientBoosting(model) => {
                matrix.iter().map(|row| model.predict_row(row)).collect()
            }
        })
    }
}

impl LinearClassifier {
    fn n_features(&self) -> usize {
        self.coefficients.first().map_or(0, Vec::len)
    }

    fn is_binary(&self) -> bool {
        self.coefficients.len() == 1
    }

    fn n_classes(&self) -> usize {
        if self.is_binary() {
            2
        } else {
            self.coefficients.len()
        }
    }

    fn validate(&mut self) -> Result<(), ArtifactError> {
        if self.classes.is_empty() {
            self.classes = (0_i64..).take(self.n_classes()).collect();
        }
        self.check()
    }

    fn check(&self) -> Result<(), ArtifactError> {
        let rows = self.coefficients.len();
        let width = self.n_features();

        if rows == 0 || width == 0 {
            return Err(malformed("linear model has no coefficients".to_owned()));
        }
        if self.coefficients.iter().any(|row| row.len() != width) {
            return Err(malformed("coefficient rows differ in width".to_owned()));
        }
        if self.intercepts.len() != rows {
            return Err(malformed(format!(
                "{} intercepts for {rows} coefficient rows",
                self.intercepts.len()
            )));
        }

        let n_classes = self.n_classes();
        if self.classes.len() != n_classes {
            return Err(malformed(format!(
                "{} class labels for {n_classes} classes",
                self.classes.len()
            )));
        }

        Ok(())
    }

    fn decision(&self, row: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(coef, intercept)| {
                coef.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + intercept
            })
            .collect()
    }

    fn predict_row(&self, row: &[f64]) -> i64 {
        let scores = self.decision(row);
        if self.is_binary() {
            self.classes[usize::from(scores[0] > 0.0)]
        } else {
            self.classes[argmax(&scores)]
        }
    }
}

impl GradientBoostingClassifier {
    fn tree_slots(&self) -> usize {
        if self.classes.len() == 2 && self.init.len() == 1 {
            1
        } else {
            self.classes.len()
        }
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.n_features == 0 {
            return Err(malformed("gradient boosting model has no features".to_owned()));
        }
        if self.classes.len() < 2 {
            return Err(malformed("gradient boosting model needs at least 2 classes".to_owned()));
        }
        if !self.learning_rate.is_finite() {
            return Err(malformed("learning rate is not finite".to_owned()));
        }

        let slots = self.tree_slots();
        if self.init.len() != slots {
            return Err(malformed(format!(
                "{} initial scores for {slots} tree slots",
                self.init.len()
            )));
        }

        for (s, stage) in self.stages.iter().enumerate() {
            if stage.len() != slots {
                return Err(malformed(format!(
                    "stage {s} has {} trees, expected {slots}",
                    stage.len()
                )));
            }
            for tree in stage {
                tree.validate(self.n_features)
                    .map_err(|message| malformed(format!("stage {s}: {message}")))?;
            }
        }

        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> i64 {
        let mut scores = self.init.clone();
        for stage in &self.stages {
            for (score, tree) in scores.iter_mut().zip(stage) {
                *score += self.learning_rate * tree.evaluate(row);
            }
        }

        if scores.len() == 1 {
            self.classes[usize::from(scores[0] > 0.0)]
        } else {
            self.classes[argmax(&scores)]
        }
    }
}

impl Tree {
    /// Checks that the tree is non-empty, references only existing input
    /// columns, and that every child index points forward (so evaluation
    /// always terminates).
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_owned());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                threshold,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {i} splits on missing feature {feature}"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {i} has a non-finite threshold"));
                }
                for child in [left, right] {
                    if *child <= i || *child >= self.nodes.len() {
                        return Err(format!("node {i} has invalid child {child}"));
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns the value of the leaf `row` falls into.
    #[must_use]
    pub fn evaluate(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}
