//! Identity map for one unit of work.
//!
//! Fetching the same row twice within a unit of work yields the same
//! [`Tracked`] handle: mutations made through one reference are visible
//! through every other. The cache also remembers the last raw row seen per
//! `(table, key)` so that writes can be compared against what is stored.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use super::CacheError;
use crate::persistence::{
    domain::{Entity, Pk, Record},
    ports::StoredRow,
};

/// Cache shared between the unit of work and the services it drives.
pub type SharedCache = Arc<Mutex<IdentityCache>>;

/// Locks a shared cache, recovering the guard if a previous holder
/// panicked.
pub fn lock_cache(cache: &SharedCache) -> MutexGuard<'_, IdentityCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to the single live instance of an entity.
pub struct Tracked<T>(Arc<RwLock<T>>);

impl<T> Tracked<T> {
    /// Wraps a value in a new handle.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Borrows the value for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrows the value for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` when both handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(left: &Self, right: &Self) -> bool {
        Arc::ptr_eq(&left.0, &right.0)
    }
}

impl<T: Clone> Tracked<T> {
    /// Copies the current value out of the handle.
    #[must_use]
    pub fn snapshot(&self) -> T {
        self.read().clone()
    }
}

impl<T: Entity> Tracked<T> {
    /// Returns the primary key of the tracked entity.
    #[must_use]
    pub fn pk(&self) -> Option<Pk> {
        self.read().pk()
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&*self.read()).finish()
    }
}

type ObjectKey = (TypeId, Pk);

/// Identity map of one unit of work.
///
/// Objects are keyed by entity type and primary key; raw rows by table name
/// and primary key. The two keyspaces are independent.
#[derive(Default)]
pub struct IdentityCache {
    objects: HashMap<ObjectKey, Box<dyn Any + Send + Sync>>,
    records: HashMap<String, HashMap<Pk, Record>>,
}

impl fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("objects", &self.objects.len())
            .field("records", &self.record_count())
            .finish()
    }
}

impl IdentityCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers the last-seen raw row for `(table, pk)`.
    pub fn store_record(&mut self, table: &str, pk: Pk, record: Record) {
        self.records
            .entry(table.to_owned())
            .or_default()
            .insert(pk, record);
    }

    /// Remembers several raw rows of one table.
    pub fn store_records(&mut self, table: &str, rows: &[StoredRow]) {
        let cached = self.records.entry(table.to_owned()).or_default();
        for row in rows {
            cached.insert(row.pk, row.record.clone());
        }
    }

    /// Forgets a raw row and returns it.
    pub fn remove_record(&mut self, table: &str, pk: Pk) -> Option<Record> {
        self.records
            .get_mut(table)
            .and_then(|cached| cached.remove(&pk))
    }

    /// Returns the last-seen raw row for `(table, pk)`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::RecordNotCached`] when the row was never stored:
    /// callers only ask for rows they fetched, so absence is a bug.
    pub fn retrieve_record(&self, table: &str, pk: Pk) -> Result<&Record, CacheError> {
        self.records
            .get(table)
            .and_then(|cached| cached.get(&pk))
            .ok_or_else(|| CacheError::record_not_cached(table, pk))
    }

    /// Returns `true` when a raw row is cached for `(table, pk)`.
    #[must_use]
    pub fn has_record(&self, table: &str, pk: Pk) -> bool {
        self.records
            .get(table)
            .is_some_and(|cached| cached.contains_key(&pk))
    }

    /// Registers an object, or returns the instance already registered for
    /// its type and key.
    ///
    /// When a registered instance exists the argument is discarded; callers
    /// must continue with the returned handle.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MissingKey`] when the object has no key.
    pub fn get_or_add_object<T: Entity>(
        &mut self,
        object: Tracked<T>,
    ) -> Result<Tracked<T>, CacheError> {
        let pk = object.pk().ok_or(CacheError::MissingKey { table: T::TABLE })?;
        if let Some(existing) = self.get_object::<T>(pk)? {
            trace!(table = T::TABLE, %pk, "identity cache hit");
            return Ok(existing);
        }
        self.objects
            .insert((TypeId::of::<T>(), pk), Box::new(object.clone()));
        Ok(object)
    }

    /// Registers every object, preserving order and replacing each by the
    /// registered instance where one exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MissingKey`] when an object has no key.
    pub fn get_or_add_objects<T: Entity>(
        &mut self,
        objects: Vec<Tracked<T>>,
    ) -> Result<Vec<Tracked<T>>, CacheError> {
        objects
            .into_iter()
            .map(|object| self.get_or_add_object(object))
            .collect()
    }

    /// Returns the registered instance for a type and key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::TypeMismatch`] when the slot holds another type.
    pub fn get_object<T: Entity>(&self, pk: Pk) -> Result<Option<Tracked<T>>, CacheError> {
        self.objects
            .get(&(TypeId::of::<T>(), pk))
            .map(|slot| {
                slot.downcast_ref::<Tracked<T>>()
                    .cloned()
                    .ok_or(CacheError::TypeMismatch {
                        table: T::TABLE,
                        pk,
                    })
            })
            .transpose()
    }

    /// Unregisters an object. Returns `true` when it was registered.
    pub fn remove_object<T: Entity>(&mut self, object: &Tracked<T>) -> bool {
        object
            .pk()
            .is_some_and(|pk| self.remove_object_by_key::<T>(pk))
    }

    /// Unregisters the object of type `T` with key `pk`.
    pub fn remove_object_by_key<T: Entity>(&mut self, pk: Pk) -> bool {
        self.objects.remove(&(TypeId::of::<T>(), pk)).is_some()
    }

    /// Drops every object and raw row.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.records.clear();
    }

    /// Number of registered objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of cached raw rows across all tables.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.values().map(HashMap::len).sum()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.record_count() == 0
    }
}
