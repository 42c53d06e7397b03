//! Call-type token classification.
//!
//! Maps raw call-type tokens (short dispatch codes such as `"MVA"` or
//! `"EDP"`) to a [`CallCategory`] using static membership tables. Tables
//! are checked in ascending priority order and the first table containing
//! the token wins, since the tables are not disjoint. Tokens found in no
//! table classify as [`CallCategory::DEFAULT`].
//!
//! The default tables live in `packages/features/categories/` and are
//! baked into the binary at compile time via [`include_str!`]. A deployment
//! may replace them with an override file (see
//! [`CategoryTables::from_toml_str`]).

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use urgency_call_models::CallCategory;

use crate::FeatureError;

/// Default tables embedded at compile time.
const CATEGORY_TOMLS: &[(&str, &str)] = &[
    ("medical", include_str!("../categories/medical.toml")),
    ("fire", include_str!("../categories/fire.toml")),
    ("traffic", include_str!("../categories/traffic.toml")),
    ("crime", include_str!("../categories/crime.toml")),
    (
        "mental_health",
        include_str!("../categories/mental_health.toml"),
    ),
];

/// One category's membership table, as loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryTable {
    /// Category the tokens belong to.
    pub category: CallCategory,
    /// Lookup order. Lower values are checked first. When no table sets
    /// one, tables are checked in the order given.
    #[serde(default)]
    pub priority: Option<u32>,
    /// Raw call-type tokens in this category.
    pub tokens: Vec<String>,
}

/// Shape of a table override file: a list of `[[tables]]` entries.
#[derive(Debug, Deserialize)]
struct CategoryTablesFile {
    tables: Vec<CategoryTable>,
}

/// Immutable, priority-ordered category membership tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTables {
    tables: Vec<(CallCategory, BTreeSet<String>)>,
}

/// Normalizes a token for comparison: surrounding whitespace is ignored and
/// ASCII letters are compared case-insensitively.
#[must_use]
pub fn normalize_token(token: &str) -> String {
    token.trim().to_ascii_uppercase()
}

/// Returns the stable integer code of a category.
#[must_use]
pub const fn encode(category: CallCategory) -> u8 {
    category.code()
}

impl CategoryTables {
    /// Builds tables from loaded entries, ordering them by priority, or
    /// keeping the given order when no entry sets a priority.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Configuration`] if a category appears twice,
    /// two tables share a priority, only some tables set a priority, or a
    /// table is given for the default category (which must stay the
    /// fallback).
    pub fn new(mut entries: Vec<CategoryTable>) -> Result<Self, FeatureError> {
        let prioritized = entries.iter().filter(|t| t.priority.is_some()).count();
        if prioritized != 0 && prioritized != entries.len() {
            return Err(FeatureError::configuration(
                "either every category table sets a priority or none does",
            ));
        }
        entries.sort_by_key(|t| t.priority);

        let mut seen_categories = BTreeSet::new();
        let mut seen_priorities = BTreeMap::new();

        for entry in &entries {
            if entry.category == CallCategory::DEFAULT {
                return Err(FeatureError::configuration(format!(
                    "{} is the fallback category and cannot have a membership table",
                    CallCategory::DEFAULT
                )));
            }
            if !seen_categories.insert(entry.category) {
                return Err(FeatureError::configuration(format!(
                    "category {} has more than one membership table",
                    entry.category
                )));
            }
            if let Some(priority) = entry.priority {
                if let Some(other) = seen_priorities.insert(priority, entry.category) {
                    return Err(FeatureError::configuration(format!(
                        "categories {other} and {} share priority {priority}",
                        entry.category
                    )));
                }
            }
        }

        let tables = entries
            .into_iter()
            .map(|entry| {
                let tokens = entry
                    .tokens
                    .iter()
                    .map(|t| normalize_token(t))
                    .filter(|t| !t.is_empty())
                    .collect();
                (entry.category, tokens)
            })
            .collect();

        Ok(Self { tables })
    }

    /// Returns the tables embedded at compile time.
    ///
    /// # Panics
    ///
    /// Panics if an embedded TOML table is malformed or the embedded tables
    /// are inconsistent.
    #[must_use]
    pub fn builtin() -> Self {
        let entries = CATEGORY_TOMLS
            .iter()
            .map(|(name, toml_str)| {
                toml::de::from_str(toml_str)
                    .unwrap_or_else(|e| panic!("Failed to parse category table '{name}': {e}"))
            })
            .collect();

        Self::new(entries).unwrap_or_else(|e| panic!("Embedded category tables are invalid: {e}"))
    }

    /// Parses an override file containing `[[tables]]` entries. Tables are
    /// checked in file order unless every entry sets a `priority`.
    ///
    /// ```toml
    /// [[tables]]
    /// category = "Traffic"
    /// tokens = ["MVA", "PEDSTR"]
    ///
    /// [[tables]]
    /// category = "Medical"
    /// tokens = ["ABDPN", "MVA"]
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Configuration`] if the TOML is malformed or
    /// the tables are inconsistent.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, FeatureError> {
        let file: CategoryTablesFile = toml::de::from_str(toml_str)
            .map_err(|e| FeatureError::configuration(format!("invalid category tables: {e}")))?;
        Self::new(file.tables)
    }

    /// Classifies a raw call-type token.
    #[must_use]
    pub fn classify(&self, token: &str) -> CallCategory {
        let normalized = normalize_token(token);

        self.tables
            .iter()
            .find(|(_, tokens)| tokens.contains(&normalized))
            .map_or(CallCategory::DEFAULT, |(category, _)| *category)
    }

    /// Returns the categories with tables, in lookup order.
    pub fn priority_order(&self) -> impl Iterator<Item = CallCategory> + '_ {
        self.tables.iter().map(|(category, _)| *category)
    }

    /// Returns the normalized tokens of a category's table.
    #[must_use]
    pub fn tokens(&self, category: CallCategory) -> Option<&BTreeSet<String>> {
        self.tables
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, tokens)| tokens)
    }
}

impl Default for CategoryTables {
    fn default() -> Self {
        Self::builtin()
    }
}
