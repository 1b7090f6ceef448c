//! Pooled-connection session for the `PostgreSQL` record store.

use diesel::PgConnection;
use diesel::pg::Pg;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sql_types::{BigInt, Jsonb};
use serde_json::Value;
use tracing::{trace, warn};

use super::sql::{render_delete, render_insert, render_select, render_update};
use crate::persistence::{
    domain::{Pk, Query, Record},
    ports::{StoreError, StoreResult, StoreSession, StoredRow},
};

type PooledConn = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Debug, QueryableByName)]
struct KeyRow {
    #[diesel(sql_type = BigInt)]
    pk: i64,
}

#[derive(Debug, QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = BigInt)]
    pk: i64,
    #[diesel(sql_type = Jsonb)]
    columns: Value,
}

/// Session holding one pooled connection.
///
/// A transaction left open when the session is dropped is rolled back
/// before the connection returns to the pool.
pub struct PostgresSession {
    conn: PooledConn,
    in_transaction: bool,
}

impl std::fmt::Debug for PostgresSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSession")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl PostgresSession {
    pub(super) const fn new(conn: PooledConn) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

fn to_document(record: &Record) -> StoreResult<Value> {
    serde_json::to_value(record).map_err(StoreError::backend)
}

fn from_document(row: JsonRow) -> StoreResult<StoredRow> {
    let record = serde_json::from_value::<Record>(row.columns).map_err(StoreError::backend)?;
    Ok(StoredRow::new(Pk::new(row.pk), record))
}

impl StoreSession for PostgresSession {
    fn begin(&mut self) -> StoreResult<()> {
        if self.in_transaction {
            return Err(StoreError::TransactionAlreadyActive);
        }
        AnsiTransactionManager::begin_transaction(self.connection())
            .map_err(StoreError::backend)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::NoActiveTransaction);
        }
        self.in_transaction = false;
        AnsiTransactionManager::commit_transaction(self.connection()).map_err(StoreError::backend)
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if !self.in_transaction {
            return Err(StoreError::NoActiveTransaction);
        }
        self.in_transaction = false;
        AnsiTransactionManager::rollback_transaction(self.connection())
            .map_err(StoreError::backend)
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn insert(&mut self, table: &str, record: &Record) -> StoreResult<Pk> {
        let statement = render_insert(table)?;
        let document = to_document(record)?;
        trace!(sql = %statement, "insert");
        let row = diesel::sql_query(statement)
            .bind::<Jsonb, _>(document)
            .get_result::<KeyRow>(self.connection())
            .map_err(StoreError::backend)?;
        Ok(Pk::new(row.pk))
    }

    fn update(&mut self, table: &str, pk: Pk, record: &Record) -> StoreResult<()> {
        let statement = render_update(table)?;
        let document = to_document(record)?;
        trace!(sql = %statement, %pk, "update");
        let affected = diesel::sql_query(statement)
            .bind::<Jsonb, _>(document)
            .bind::<BigInt, _>(pk.value())
            .execute(self.connection())
            .map_err(StoreError::backend)?;
        if affected == 0 {
            return Err(StoreError::row_not_found(table, pk));
        }
        Ok(())
    }

    fn delete(&mut self, table: &str, pk: Pk) -> StoreResult<()> {
        let statement = render_delete(table)?;
        trace!(sql = %statement, %pk, "delete");
        let affected = diesel::sql_query(statement)
            .bind::<BigInt, _>(pk.value())
            .execute(self.connection())
            .map_err(StoreError::backend)?;
        if affected == 0 {
            return Err(StoreError::row_not_found(table, pk));
        }
        Ok(())
    }

    fn select(&mut self, query: &Query) -> StoreResult<Vec<StoredRow>> {
        let rendered = render_select(query)?;
        trace!(sql = %rendered.text, params = rendered.params.len(), "select");
        let statement = rendered.params.into_iter().fold(
            diesel::sql_query(rendered.text).into_boxed::<Pg>(),
            |boxed, param| boxed.bind::<Jsonb, _>(param),
        );
        statement
            .load::<JsonRow>(self.connection())
            .map_err(StoreError::backend)?
            .into_iter()
            .map(from_document)
            .collect()
    }
}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        self.in_transaction = false;
        if let Err(err) = AnsiTransactionManager::rollback_transaction(self.connection()) {
            warn!(error = %err, "rollback of abandoned transaction failed");
        }
    }
}
