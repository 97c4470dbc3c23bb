//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Errors raised while building, mutating or querying a component tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown type '{key}' in mapping under '{parent}'")]
    UnknownTypeInMapping { key: String, parent: String },

    #[error("unknown type '{key}' in sequence under '{parent}'")]
    UnknownTypeInSequence { key: String, parent: String },

    #[error("base type '{0}' is not registered")]
    UnregisteredBase(String),

    #[error("cannot convert {value} to {expected}")]
    TypeMismatch { value: String, expected: String },

    #[error("malformed configuration at '{path}': {reason}")]
    MalformedConfig { path: String, reason: String },

    #[error("construction conflict: {0}")]
    ConstructionConflict(String),

    #[error("field '{field}' on '{node}' is read-only")]
    ReadOnly { node: String, field: String },

    #[error("cannot assign {kind} value to '{key}' on '{node}'")]
    InvalidAssignment {
        node: String,
        key: String,
        kind: String,
    },

    #[error("host binding failed: {0}")]
    Binding(String),

    #[error("expression error in '{text}': {reason}")]
    Expression { text: String, reason: String },

    #[error("node handle is stale or was freed")]
    StaleNode,

    #[error("config error: {message}")]
    Config { message: String },
}

impl ModelError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn expression(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Expression {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
