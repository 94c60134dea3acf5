//! Evaluation options

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// What evaluation does when a record lacks a referenced field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Treat the field as null: only `exact null`, `isnull true` and `ne`
    /// against a non-null operand match
    #[default]
    Null,
    /// Fail with `FieldNotFound`
    Error,
}

/// Options controlling evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    pub missing_field: MissingFieldPolicy,
}

impl EvalOptions {
    /// Options that reject records with missing fields
    pub fn strict() -> Self {
        Self {
            missing_field: MissingFieldPolicy::Error,
        }
    }

    /// Load options from JSON, e.g. `{"missing_field": "error"}`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
