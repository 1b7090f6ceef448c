//! Error types for record mapping and timeframe validation.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned while mapping a stored record onto a typed entity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordMappingError {
    /// The record does not contain the column.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// The column holds a value of another type.
    #[error("column '{column}' does not hold a {expected} value")]
    TypeMismatch {
        /// Name of the offending column.
        column: String,
        /// Type the mapper expected.
        expected: &'static str,
    },

    /// The column value is well typed but not acceptable for the entity.
    #[error("invalid value in column '{column}': {reason}")]
    InvalidValue {
        /// Name of the offending column.
        column: String,
        /// Description of the problem.
        reason: String,
    },
}

impl RecordMappingError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned when a timeframe ends before it starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("timeframe stops at {stop} before it starts at {start}")]
pub struct TimeframeError {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub stop: DateTime<Utc>,
}
