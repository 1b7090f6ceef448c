//! Record store port: sessions, transactions and column-record statements.
//!
//! The persistence core never speaks SQL. It hands [`Record`]s and
//! [`Query`] values to a [`StoreSession`] and receives stored rows back.
//! Statements issued outside an explicit transaction autocommit.

use crate::persistence::domain::{Pk, Query, Record};
use std::sync::Arc;
use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A stored row: surrogate key plus column record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Primary key of the row.
    pub pk: Pk,
    /// Columns of the row.
    pub record: Record,
}

impl StoredRow {
    /// Pairs a key with its columns.
    #[must_use]
    pub const fn new(pk: Pk, record: Record) -> Self {
        Self { pk, record }
    }
}

/// Factory for store sessions.
pub trait RecordStore: Send + Sync {
    /// Opens a new session, typically backed by one connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when no connection can be obtained.
    fn open_session(&self) -> StoreResult<Box<dyn StoreSession>>;
}

/// One connection-like handle, used by a single unit of work at a time.
pub trait StoreSession: Send {
    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionAlreadyActive`] when one is open.
    fn begin(&mut self) -> StoreResult<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoActiveTransaction`] when none is open.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoActiveTransaction`] when none is open.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Returns `true` while a transaction is open.
    fn in_transaction(&self) -> bool;

    /// Inserts a record and returns its generated key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the table name is invalid or the backend
    /// fails.
    fn insert(&mut self, table: &str, record: &Record) -> StoreResult<Pk>;

    /// Replaces every column of an existing row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RowNotFound`] when the key does not exist.
    fn update(&mut self, table: &str, pk: Pk, record: &Record) -> StoreResult<()>;

    /// Physically removes a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RowNotFound`] when the key does not exist.
    fn delete(&mut self, table: &str, pk: Pk) -> StoreResult<()>;

    /// Runs a selection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when an identifier is invalid or the backend
    /// fails.
    fn select(&mut self, query: &Query) -> StoreResult<Vec<StoredRow>>;
}

/// Errors returned by record store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Commit or rollback without an open transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Begin while a transaction is already open.
    #[error("a transaction is already active")]
    TransactionAlreadyActive,

    /// The addressed row does not exist.
    #[error("row {pk} not found in table '{table}'")]
    RowNotFound {
        /// Table name.
        table: String,
        /// Missing key.
        pk: Pk,
    },

    /// A table or column name is not a plain identifier.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Backend failure.
    #[error("store backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backend error.
    #[must_use]
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }

    /// Creates a missing row error.
    #[must_use]
    pub fn row_not_found(table: impl Into<String>, pk: Pk) -> Self {
        Self::RowNotFound {
            table: table.into(),
            pk,
        }
    }
}
