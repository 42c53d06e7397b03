//! Urgency label resolution.

use serde::{Deserialize, Serialize};

/// Label returned for class indices outside the configured table.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Fixed lookup from a model's class index to a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyLabels {
    /// Labels indexed by predicted class.
    #[serde(default = "default_names")]
    pub names: Vec<String>,
    /// Label returned for classes the table does not cover.
    #[serde(default = "default_unknown")]
    pub unknown: String,
}

fn default_names() -> Vec<String> {
    ["Low Urgency", "Medium Urgency", "High Urgency"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_unknown() -> String {
    UNKNOWN_LABEL.to_owned()
}

impl Default for UrgencyLabels {
    fn default() -> Self {
        Self {
            names: default_names(),
            unknown: default_unknown(),
        }
    }
}

impl UrgencyLabels {
    /// Resolves a predicted class to its label.
    ///
    /// Negative and out-of-range classes resolve to the unknown label so a
    /// retrained model emitting an unseen class degrades gracefully.
    #[must_use]
    pub fn resolve(&self, predicted_class: i64) -> &str {
        usize::try_from(predicted_class)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .map_or(self.unknown.as_str(), String::as_str)
    }

    /// Returns the number of known classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no class has a label.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
