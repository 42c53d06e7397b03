#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Emergency call category taxonomy, raw call records, and urgency labels.
//!
//! This crate defines the closed set of call categories every raw call-type
//! token is classified into, the per-request [`RawCallRecord`] collected
//! from the presentation layer, and the [`UrgencyLabels`] lookup used to
//! turn a model's class index into a human-readable label.

pub mod features;
pub mod labels;
pub mod record;

pub use labels::UrgencyLabels;
pub use record::{DerivedFeatures, FieldValue, InputColumns, RawCallRecord};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Semantic category of an emergency call.
///
/// Variants are declared in classification priority order: when a token
/// appears in more than one membership table, the earlier category wins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum CallCategory {
    /// Sickness, injury, cardiac and other patient-care calls
    Medical,
    /// Fires, smoke, burns and hazardous materials
    Fire,
    /// Motor vehicle collisions and pedestrian strikes
    Traffic,
    /// Shootings, stabbings, assaults and other police-involved calls
    Crime,
    /// Emotionally disturbed persons and psychiatric emergencies
    #[serde(rename = "Mental_Health")]
    #[strum(serialize = "Mental_Health")]
    MentalHealth,
    /// Calls that match no membership table
    Other,
}

impl CallCategory {
    /// Category assigned to tokens that match no membership table.
    pub const DEFAULT: Self = Self::Other;

    /// Number of categories (and of distinct encoded values).
    pub const COUNT: usize = 6;

    /// Returns the stable integer code the model was trained against.
    ///
    /// Codes follow the alphabetical order of the category names, which is
    /// the order a label encoder fitted on the training data assigns.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Crime => 0,
            Self::Fire => 1,
            Self::Medical => 2,
            Self::MentalHealth => 3,
            Self::Other => 4,
            Self::Traffic => 5,
        }
    }

    /// Creates a category from its integer code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is not in the range 0-5.
    pub const fn from_code(code: u8) -> Result<Self, InvalidCategoryCodeError> {
        match code {
            0 => Ok(Self::Crime),
            1 => Ok(Self::Fire),
            2 => Ok(Self::Medical),
            3 => Ok(Self::MentalHealth),
            4 => Ok(Self::Other),
            5 => Ok(Self::Traffic),
            _ => Err(InvalidCategoryCodeError { code }),
        }
    }

    /// Returns all variants in classification priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Medical,
            Self::Fire,
            Self::Traffic,
            Self::Crime,
            Self::MentalHealth,
            Self::Other,
        ]
    }
}

/// Error returned when attempting to create a [`CallCategory`] from an
/// invalid code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCategoryCodeError {
    /// The invalid code that was provided.
    pub code: u8,
}

impl std::fmt::Display for InvalidCategoryCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid call category code {}: expected 0-{}",
            self.code,
            CallCategory::COUNT - 1
        )
    }
}

impl std::error::Error for InvalidCategoryCodeError {}
