//! Error types for the predicate composer

use thiserror::Error;

/// Main error type for building, evaluating and translating expressions
#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Operator `{operator}` cannot take {found} operand (expected {expected})")]
    TypeOperandMismatch {
        operator: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Cannot apply `{operator}` to field `{field}`: {value} value against {operand} operand")]
    TypeMismatch {
        field: String,
        operator: &'static str,
        value: &'static str,
        operand: &'static str,
    },

    #[error("Invalid regex `{pattern}`: {source}")]
    RegexCompile {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for ComposerError {
    fn from(err: serde_json::Error) -> Self {
        ComposerError::Deserialization(err.to_string())
    }
}

/// Result type alias for the predicate composer
pub type Result<T> = std::result::Result<T, ComposerError>;
