//! Low-level reads and writes through the identity cache.

use tracing::trace;

use crate::persistence::{
    cache::{SharedCache, Tracked, lock_cache},
    domain::{Entity, HardDeletable, Pk, Query, Record, RecordMappingError},
    error::{PersistenceError, PersistenceResult},
    ports::{StoreError, StoreSession},
};

/// Insert, save, delete and find operations of one unit of work.
///
/// Obtained from [`crate::persistence::unit_of_work::UnitOfWork::strategy`];
/// borrows the unit's session for its lifetime.
pub struct PersistenceStrategy<'u> {
    session: &'u mut dyn StoreSession,
    cache: SharedCache,
}

impl std::fmt::Debug for PersistenceStrategy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceStrategy")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn hydrate<T: Entity>(pk: Pk, record: &Record) -> Result<T, RecordMappingError> {
    let mut entity = T::from_record(pk, record)?;
    entity.on_post_load();
    Ok(entity)
}

fn require_table<T: Entity>(query: &Query) -> PersistenceResult<()> {
    if query.table() == T::TABLE {
        Ok(())
    } else {
        Err(PersistenceError::foreign_table(T::TABLE, query.table()))
    }
}

fn require_pk<T: Entity>(object: &Tracked<T>) -> PersistenceResult<Pk> {
    object
        .pk()
        .ok_or(PersistenceError::MissingKey { table: T::TABLE })
}

impl<'u> PersistenceStrategy<'u> {
    /// Binds a session and a cache.
    #[must_use]
    pub fn new(session: &'u mut dyn StoreSession, cache: SharedCache) -> Self {
        Self { session, cache }
    }

    /// Runs `query`, registers raw rows and objects in the cache and returns
    /// the single live instance of every matching row.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ForeignTable`] when `query` does not
    /// select from `T`'s table, or [`PersistenceError`] when the store or a
    /// mapper fails.
    pub fn find<T: Entity>(&mut self, query: &Query) -> PersistenceResult<Vec<Tracked<T>>> {
        require_table::<T>(query)?;
        let rows = self.session.select(query)?;
        let fetched = rows
            .iter()
            .map(|row| hydrate::<T>(row.pk, &row.record).map(Tracked::new))
            .collect::<Result<Vec<_>, _>>()?;
        let mut cache = lock_cache(&self.cache);
        cache.store_records(query.table(), &rows);
        Ok(cache.get_or_add_objects(fetched)?)
    }

    /// Like [`PersistenceStrategy::find`] for at most one row.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotUnique`] when several rows match.
    pub fn find_unique<T: Entity>(
        &mut self,
        query: &Query,
    ) -> PersistenceResult<Option<Tracked<T>>> {
        let mut found = self.find::<T>(query)?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            count => Err(PersistenceError::not_unique(query.table(), count)),
        }
    }

    /// Runs `query` and hydrates entities without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store or a mapper fails.
    pub fn execute_query<T: Entity>(&mut self, query: &Query) -> PersistenceResult<Vec<T>> {
        self.execute_query_with(query, hydrate::<T>)
    }

    /// Runs `query` and maps every row with `map`, without touching the
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store or `map` fails.
    pub fn execute_query_with<R, M>(&mut self, query: &Query, map: M) -> PersistenceResult<Vec<R>>
    where
        M: Fn(Pk, &Record) -> Result<R, RecordMappingError>,
    {
        let rows = self.session.select(query)?;
        rows.iter()
            .map(|row| map(row.pk, &row.record).map_err(Into::into))
            .collect()
    }

    /// Inserts the object, assigns the generated key and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Store`] when the insert fails.
    pub fn insert<T: Entity>(&mut self, object: &Tracked<T>) -> PersistenceResult<Tracked<T>> {
        let record = object.read().to_record();
        let pk = self.session.insert(T::TABLE, &record)?;
        object.write().set_pk(pk);
        let mut cache = lock_cache(&self.cache);
        cache.store_record(T::TABLE, pk, record);
        Ok(cache.get_or_add_object(object.clone())?)
    }

    /// Writes every column of a stored object and returns the same handle.
    ///
    /// The object map is left untouched; the raw-row snapshot is refreshed
    /// to what was written.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::MissingKey`] for an unsaved object, or
    /// [`PersistenceError::Store`] when the update fails.
    pub fn save<T: Entity>(&mut self, object: &Tracked<T>) -> PersistenceResult<Tracked<T>> {
        let pk = require_pk(object)?;
        let record = object.read().to_record();
        self.session.update(T::TABLE, pk, &record)?;
        lock_cache(&self.cache).store_record(T::TABLE, pk, record);
        Ok(object.clone())
    }

    /// Physically removes an auxiliary object and forgets it.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::MissingKey`] for an unsaved object, or
    /// [`PersistenceError::Store`] when the delete fails.
    pub fn delete<T: HardDeletable>(&mut self, object: &Tracked<T>) -> PersistenceResult<()> {
        let pk = require_pk(object)?;
        self.session.delete(T::TABLE, pk)?;
        let mut cache = lock_cache(&self.cache);
        cache.remove_record(T::TABLE, pk);
        cache.remove_object(object);
        Ok(())
    }

    /// Inserts a raw record without caching it.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Store`] when the insert fails.
    pub fn insert_record(&mut self, table: &str, record: &Record) -> PersistenceResult<Pk> {
        Ok(self.session.insert(table, record)?)
    }

    /// Returns the last-seen raw row of `(table, pk)`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Cache`] when the row was never fetched in
    /// this unit of work.
    pub fn retrieve_cached_record(&self, table: &str, pk: Pk) -> PersistenceResult<Record> {
        Ok(lock_cache(&self.cache).retrieve_record(table, pk)?.clone())
    }

    /// Returns the last-seen raw row of `(table, pk)`, reading it from the
    /// store when this unit of work has not seen it yet.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Store`] when the row does not exist or
    /// the select fails.
    pub fn load_record(&mut self, table: &str, pk: Pk) -> PersistenceResult<Record> {
        if let Ok(record) = self.retrieve_cached_record(table, pk) {
            trace!(table, %pk, "raw row cache hit");
            return Ok(record);
        }
        let row = self
            .session
            .select(&Query::by_pk(table, pk))?
            .pop()
            .ok_or_else(|| StoreError::row_not_found(table, pk))?;
        lock_cache(&self.cache).store_record(table, pk, row.record.clone());
        Ok(row.record)
    }
}
