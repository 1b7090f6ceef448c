//! Error type of the audited persistence services.
//!
//! Uses `thiserror` with one variant per failure a caller may want to
//! inspect. Lower-layer errors convert with `?`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use super::cache::CacheError;
use super::domain::RecordMappingError;
use super::ports::StoreError;

/// Result type for persistence service operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors returned by units of work, strategies and repositories.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored row could not be mapped onto its entity.
    #[error(transparent)]
    Mapping(#[from] RecordMappingError),

    /// The identity cache was used incorrectly.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A unique lookup matched several rows.
    #[error("expected at most one row in table '{table}' but found {count}")]
    NotUnique {
        /// Queried table.
        table: String,
        /// Number of matching rows.
        count: usize,
    },

    /// A query on another table was used to load entities.
    #[error("query on table '{queried}' cannot load entities of table '{expected}'")]
    ForeignTable {
        /// Table of the requested entity type.
        expected: &'static str,
        /// Table the query selects from.
        queried: String,
    },

    /// A mutation or audit action was attempted without a rationale.
    #[error("a non-empty rationale is required for every mutation")]
    EmptyRationale,

    /// The entity has no primary key although the operation needs one.
    #[error("entity of table '{table}' has not been inserted yet")]
    MissingKey {
        /// Table of the entity.
        table: &'static str,
    },

    /// A mutation was attempted inside a read-only unit of work.
    #[error("unit of work is read-only")]
    ReadOnlyUnitOfWork,

    /// A mutation was attempted before any action context exists.
    #[error("no database action context is attached to the unit of work")]
    MissingContext,

    /// The action date precedes the entity's creation or last update.
    #[error("action dated {date} predates the last change of an entity of table '{table}'")]
    BackdatedContext {
        /// Table of the entity.
        table: &'static str,
        /// Date of the rejected action.
        date: DateTime<Utc>,
    },

    /// The audit action of the unit of work could not be created.
    #[error("failed to create the audit action: {0}")]
    AuditActionUnavailable(Arc<PersistenceError>),

    /// The blocking worker running the unit of work failed.
    #[error("unit of work task failed: {0}")]
    TaskJoin(String),
}

impl PersistenceError {
    /// Wraps the cause of a failed audit action creation.
    #[must_use]
    pub fn audit_action_unavailable(cause: Self) -> Self {
        Self::AuditActionUnavailable(Arc::new(cause))
    }

    /// Creates a foreign-table error.
    #[must_use]
    pub fn foreign_table(expected: &'static str, queried: impl Into<String>) -> Self {
        Self::ForeignTable {
            expected,
            queried: queried.into(),
        }
    }

    /// Creates a not-unique error.
    #[must_use]
    pub fn not_unique(table: impl Into<String>, count: usize) -> Self {
        Self::NotUnique {
            table: table.into(),
            count,
        }
    }
}
