//! Identity cache errors.

use crate::persistence::domain::Pk;
use thiserror::Error;

/// Errors raised by [`super::IdentityCache`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// A raw row was requested that was never fetched in this unit of work.
    #[error("no cached record for key {pk} in table '{table}'")]
    RecordNotCached {
        /// Table name.
        table: String,
        /// Requested key.
        pk: Pk,
    },

    /// An object without a primary key cannot be registered.
    #[error("cannot track an unsaved object of table '{table}'")]
    MissingKey {
        /// Table of the object.
        table: &'static str,
    },

    /// The slot for the key holds an object of another type.
    #[error("cached object for key {pk} in table '{table}' has an unexpected type")]
    TypeMismatch {
        /// Table of the requested type.
        table: &'static str,
        /// Requested key.
        pk: Pk,
    },
}

impl CacheError {
    /// Creates a missing record error.
    #[must_use]
    pub fn record_not_cached(table: impl Into<String>, pk: Pk) -> Self {
        Self::RecordNotCached {
            table: table.into(),
            pk,
        }
    }
}
