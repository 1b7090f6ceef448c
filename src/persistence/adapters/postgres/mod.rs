//! `PostgreSQL` implementation of the record store port using Diesel.
//!
//! Every tracked table stores its columns in one JSONB document beside a
//! generated `BIGSERIAL` key. Sessions hold one pooled connection and drive
//! transactions through Diesel's ANSI transaction manager.

mod session;
pub(crate) mod sql;

use std::time::Duration;

use diesel::PgConnection;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

use crate::config::DatabaseConfig;
use crate::persistence::ports::{RecordStore, StoreError, StoreResult, StoreSession};

pub use session::PostgresSession;

/// `PostgreSQL` connection pool type.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Schema installed by [`PostgresRecordStore::install_schema`].
pub const AUDIT_CORE_SCHEMA: &str =
    include_str!("../../../../migrations/2026-10-01-000000_create_audit_core/up.sql");

/// `PostgreSQL` implementation of [`RecordStore`].
///
/// # Example
///
/// ```ignore
/// use trial_persistence::config::DatabaseConfig;
/// use trial_persistence::persistence::adapters::postgres::PostgresRecordStore;
///
/// let store = PostgresRecordStore::connect(&DatabaseConfig::default())?;
/// store.install_schema()?;
/// store.ensure_history_table("dataset_audit")?;
/// ```
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the pool cannot be built.
    pub fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(config.url.as_str());
        let pool = Pool::builder()
            .max_size(config.pool_max_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .map_err(StoreError::backend)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Installs the helper functions and the audit action table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the statements fail.
    pub fn install_schema(&self) -> StoreResult<()> {
        let mut conn = self.pool.get().map_err(StoreError::backend)?;
        conn.batch_execute(AUDIT_CORE_SCHEMA)
            .map_err(StoreError::backend)
    }

    /// Creates a live-row table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIdentifier`] for an invalid name, or
    /// [`StoreError::Backend`] when the statement fails.
    pub fn ensure_tracked_table(&self, table: &str) -> StoreResult<()> {
        self.call_table_function("create_tracked_table", table)
    }

    /// Creates a history table, indexed for trail lookups, if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIdentifier`] for an invalid name, or
    /// [`StoreError::Backend`] when the statement fails.
    pub fn ensure_history_table(&self, table: &str) -> StoreResult<()> {
        self.call_table_function("create_history_table", table)
    }

    fn call_table_function(&self, function: &'static str, table: &str) -> StoreResult<()> {
        let table_name = sql::validate_identifier(table)?;
        let mut conn = self.pool.get().map_err(StoreError::backend)?;
        diesel::sql_query(format!("SELECT {function}($1)"))
            .bind::<diesel::sql_types::Text, _>(table_name)
            .execute(&mut conn)
            .map_err(StoreError::backend)?;
        Ok(())
    }
}

impl RecordStore for PostgresRecordStore {
    fn open_session(&self) -> StoreResult<Box<dyn StoreSession>> {
        let conn = self.pool.get().map_err(StoreError::backend)?;
        Ok(Box::new(PostgresSession::new(conn)))
    }
}
