//! In-memory record store for tests and embedding.
//!
//! Committed rows live in shared state. Each session buffers the writes of
//! its open transaction in an overlay: the session reads its own writes,
//! other sessions only see committed rows. Key sequences are never rolled
//! back.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::persistence::{
    domain::{Pk, Query, Record},
    ports::{RecordStore, StoreError, StoreResult, StoreSession, StoredRow},
};

/// Thread-safe in-memory record store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<RwLock<InMemoryStoreState>>,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    tables: HashMap<String, BTreeMap<Pk, Record>>,
    sequences: HashMap<String, i64>,
}

/// Uncommitted writes per table; `None` marks a removed row.
type Overlay = HashMap<String, BTreeMap<Pk, Option<Record>>>;

fn lock_error<T>(err: &PoisonError<T>) -> StoreError {
    StoreError::backend(std::io::Error::other(err.to_string()))
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a typed session on the store.
    #[must_use]
    pub fn session(&self) -> InMemorySession {
        InMemorySession {
            state: Arc::clone(&self.state),
            overlay: None,
        }
    }

    /// Returns every committed row of `table` in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the state lock is poisoned.
    pub fn committed_rows(&self, table: &str) -> StoreResult<Vec<StoredRow>> {
        let state = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|(pk, record)| StoredRow::new(*pk, record.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Returns the number of committed rows of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the state lock is poisoned.
    pub fn row_count(&self, table: &str) -> StoreResult<usize> {
        let state = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(state.tables.get(table).map_or(0, BTreeMap::len))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn open_session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(self.session()))
    }
}

/// Session over an [`InMemoryRecordStore`].
#[derive(Debug)]
pub struct InMemorySession {
    state: Arc<RwLock<InMemoryStoreState>>,
    overlay: Option<Overlay>,
}

impl InMemorySession {
    fn next_pk(&self, table: &str) -> StoreResult<Pk> {
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        let sequence = state.sequences.entry(table.to_owned()).or_insert(0);
        *sequence += 1;
        Ok(Pk::new(*sequence))
    }

    fn visible_rows(&self, table: &str) -> StoreResult<BTreeMap<Pk, Record>> {
        let state = self.state.read().map_err(|err| lock_error(&err))?;
        let mut rows = state.tables.get(table).cloned().unwrap_or_default();
        drop(state);
        if let Some(pending) = self.overlay.as_ref().and_then(|overlay| overlay.get(table)) {
            for (pk, change) in pending {
                match change {
                    Some(record) => {
                        rows.insert(*pk, record.clone());
                    }
                    None => {
                        rows.remove(pk);
                    }
                }
            }
        }
        Ok(rows)
    }

    fn row_exists(&self, table: &str, pk: Pk) -> StoreResult<bool> {
        if let Some(change) = self
            .overlay
            .as_ref()
            .and_then(|overlay| overlay.get(table))
            .and_then(|pending| pending.get(&pk))
        {
            return Ok(change.is_some());
        }
        let state = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(state
            .tables
            .get(table)
            .is_some_and(|rows| rows.contains_key(&pk)))
    }

    fn write(&mut self, table: &str, pk: Pk, change: Option<Record>) -> StoreResult<()> {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay
                .entry(table.to_owned())
                .or_default()
                .insert(pk, change);
            return Ok(());
        }
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        apply_change(&mut state, table, pk, change);
        Ok(())
    }
}

fn apply_change(state: &mut InMemoryStoreState, table: &str, pk: Pk, change: Option<Record>) {
    let rows = state.tables.entry(table.to_owned()).or_default();
    match change {
        Some(record) => {
            rows.insert(pk, record);
        }
        None => {
            rows.remove(&pk);
        }
    }
}

impl StoreSession for InMemorySession {
    fn begin(&mut self) -> StoreResult<()> {
        if self.overlay.is_some() {
            return Err(StoreError::TransactionAlreadyActive);
        }
        self.overlay = Some(Overlay::new());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        let overlay = self.overlay.take().ok_or(StoreError::NoActiveTransaction)?;
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        for (table, pending) in overlay {
            for (pk, change) in pending {
                apply_change(&mut state, &table, pk, change);
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.overlay
            .take()
            .map(drop)
            .ok_or(StoreError::NoActiveTransaction)
    }

    fn in_transaction(&self) -> bool {
        self.overlay.is_some()
    }

    fn insert(&mut self, table: &str, record: &Record) -> StoreResult<Pk> {
        let pk = self.next_pk(table)?;
        trace!(table, %pk, "insert");
        self.write(table, pk, Some(record.clone()))?;
        Ok(pk)
    }

    fn update(&mut self, table: &str, pk: Pk, record: &Record) -> StoreResult<()> {
        if !self.row_exists(table, pk)? {
            return Err(StoreError::row_not_found(table, pk));
        }
        trace!(table, %pk, "update");
        self.write(table, pk, Some(record.clone()))
    }

    fn delete(&mut self, table: &str, pk: Pk) -> StoreResult<()> {
        if !self.row_exists(table, pk)? {
            return Err(StoreError::row_not_found(table, pk));
        }
        trace!(table, %pk, "delete");
        self.write(table, pk, None)
    }

    fn select(&mut self, query: &Query) -> StoreResult<Vec<StoredRow>> {
        let mut rows: Vec<StoredRow> = self
            .visible_rows(query.table())?
            .into_iter()
            .filter(|(pk, record)| query.matches(*pk, record))
            .map(|(pk, record)| StoredRow::new(pk, record))
            .collect();
        rows.sort_by(|left, right| {
            query.compare_rows((left.pk, &left.record), (right.pk, &right.record))
        });
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit);
        }
        trace!(table = query.table(), rows = rows.len(), "select");
        Ok(rows)
    }
}
