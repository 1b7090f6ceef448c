//! Plain CRUD for auxiliary rows that are neither audited nor soft-deleted.

use std::marker::PhantomData;

use tracing::debug;

use crate::persistence::{
    cache::Tracked,
    domain::{HardDeletable, Pk, Query},
    error::{PersistenceError, PersistenceResult},
    unit_of_work::UnitOfWork,
};

/// Repository for [`HardDeletable`] entities such as transient file blobs.
pub struct AuxiliaryRepository<T: HardDeletable> {
    entity: PhantomData<fn() -> T>,
}

impl<T: HardDeletable> std::fmt::Debug for AuxiliaryRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuxiliaryRepository")
            .field("table", &T::TABLE)
            .finish()
    }
}

impl<T: HardDeletable> Default for AuxiliaryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HardDeletable> AuxiliaryRepository<T> {
    /// Creates the repository.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entity: PhantomData,
        }
    }

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ReadOnlyUnitOfWork`] for read-only units,
    /// or the store error.
    pub fn insert(&self, uow: &mut UnitOfWork, entity: T) -> PersistenceResult<Tracked<T>> {
        if uow.is_read_only() {
            return Err(PersistenceError::ReadOnlyUnitOfWork);
        }
        let object = Tracked::new(entity);
        uow.transaction(|uow| uow.strategy().insert(&object))
    }

    /// Returns the row with key `pk`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store or the mapper fails.
    pub fn get_by_pk(
        &self,
        uow: &mut UnitOfWork,
        pk: Pk,
    ) -> PersistenceResult<Option<Tracked<T>>> {
        uow.transaction(|uow| uow.strategy().find_unique(&Query::by_pk(T::TABLE, pk)))
    }

    /// Returns the rows matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store or the mapper fails.
    pub fn find(&self, uow: &mut UnitOfWork, query: &Query) -> PersistenceResult<Vec<Tracked<T>>> {
        uow.transaction(|uow| uow.strategy().find(query))
    }

    /// Physically removes the row.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::MissingKey`] for an unsaved object,
    /// [`PersistenceError::ReadOnlyUnitOfWork`] for read-only units, or the
    /// store error.
    pub fn delete(&self, uow: &mut UnitOfWork, object: &Tracked<T>) -> PersistenceResult<()> {
        if uow.is_read_only() {
            return Err(PersistenceError::ReadOnlyUnitOfWork);
        }
        object.write().on_pre_update();
        uow.transaction(|uow| uow.strategy().delete(object))?;
        debug!(table = T::TABLE, "hard deleted");
        Ok(())
    }
}
