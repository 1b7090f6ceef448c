//! Generic repository for audited, soft-deletable entities.
//!
//! Every write of an audited entity appends one history row holding the
//! entity's full post-mutation state, inside the same transaction as the
//! write. History rows are never updated or removed.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::history::{
    PropertyExtractor, audit_trail_query, collapse_by_properties, collapse_by_property,
};
use crate::persistence::{
    cache::Tracked,
    domain::{
        ActorKey, AuditTrail, Auditable, Condition, DELETED_COLUMN, DatabaseActionContext, Pk,
        Query, Timeframe,
    },
    error::{PersistenceError, PersistenceResult},
    unit_of_work::UnitOfWork,
};

/// How a write treats an unchanged entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Skip the write when the entity matches the last-seen row.
    SkipUnchanged,
    /// Always write.
    Force,
}

/// CRUD, soft delete, restore and history queries for entity type `T`.
pub struct AuditableRepository<T: Auditable> {
    entity: PhantomData<fn() -> T>,
}

impl<T: Auditable> std::fmt::Debug for AuditableRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditableRepository")
            .field("table", &T::TABLE)
            .field("audit_table", &T::AUDIT_TABLE)
            .finish()
    }
}

impl<T: Auditable> Clone for AuditableRepository<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Auditable> Copy for AuditableRepository<T> {}

impl<T: Auditable> Default for AuditableRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_mutation(uow: &UnitOfWork, rationale: &str) -> PersistenceResult<()> {
    if uow.is_read_only() {
        return Err(PersistenceError::ReadOnlyUnitOfWork);
    }
    if rationale.trim().is_empty() {
        return Err(PersistenceError::EmptyRationale);
    }
    Ok(())
}

fn not_removed() -> Condition {
    Condition::eq(DELETED_COLUMN, false)
}

impl<T: Auditable> AuditableRepository<T> {
    /// Creates the repository.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entity: PhantomData,
        }
    }

    /// Starts a query over the live table.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::select_from(T::TABLE)
    }

    /// Returns the live instance with key `pk`, deleted or not.
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

    /// Returns the rows matching `query` that are not soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ForeignTable`] unless `query` selects from
    /// the live table, or [`PersistenceError`] when the store or the mapper
    /// fails.
    pub fn find(&self, uow: &mut UnitOfWork, query: Query) -> PersistenceResult<Vec<Tracked<T>>> {
        self.find_including_removed(uow, query.filter(not_removed()))
    }

    /// Returns the rows matching `query`, soft-deleted ones included.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ForeignTable`] unless `query` selects from
    /// the live table, or [`PersistenceError`] when the store or the mapper
    /// fails.
    pub fn find_including_removed(
        &self,
        uow: &mut UnitOfWork,
        query: Query,
    ) -> PersistenceResult<Vec<Tracked<T>>> {
        uow.transaction(|uow| uow.strategy().find(&query))
    }

    /// Returns the single non-deleted row matching `query`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotUnique`] when several rows match.
    pub fn find_unique(
        &self,
        uow: &mut UnitOfWork,
        query: Query,
    ) -> PersistenceResult<Option<Tracked<T>>> {
        let filtered = query.filter(not_removed());
        uow.transaction(|uow| uow.strategy().find_unique(&filtered))
    }

    /// Wraps a fresh entity in a tracked handle and saves it.
    ///
    /// # Errors
    ///
    /// See [`AuditableRepository::save`].
    pub fn create(
        &self,
        uow: &mut UnitOfWork,
        entity: T,
        context: &DatabaseActionContext,
        rationale: &str,
    ) -> PersistenceResult<Tracked<T>> {
        let object = Tracked::new(entity);
        self.save(uow, &object, context, rationale)?;
        Ok(object)
    }

    /// Inserts or updates the entity and appends its history row.
    ///
    /// Returns `false` without writing anything when the entity is already
    /// stored and unchanged since it was last read or written.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::EmptyRationale`],
    /// [`PersistenceError::ReadOnlyUnitOfWork`],
    /// [`PersistenceError::BackdatedContext`] when the action date precedes
    /// the entity's creation or last update, or any store error. On error
    /// nothing is written.
    pub fn save(
        &self,
        uow: &mut UnitOfWork,
        object: &Tracked<T>,
        context: &DatabaseActionContext,
        rationale: &str,
    ) -> PersistenceResult<bool> {
        validate_mutation(uow, rationale)?;
        object.write().on_pre_update();
        uow.transaction(|uow| {
            write_audited(uow, object, context, rationale, WriteMode::SkipUnchanged)
        })
    }

    /// Flags the entity deleted and appends its history row.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::MissingKey`] for an entity that was never
    /// saved, and the errors of [`AuditableRepository::save`].
    pub fn delete(
        &self,
        uow: &mut UnitOfWork,
        object: &Tracked<T>,
        context: &DatabaseActionContext,
        rationale: &str,
    ) -> PersistenceResult<()> {
        self.set_deleted(uow, object, context, rationale, true)?;
        debug!(
            actor = context.actor_name(),
            table = T::TABLE,
            rationale,
            "soft deleted"
        );
        Ok(())
    }

    /// Clears the deleted flag and appends the history row.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::MissingKey`] for an entity that was never
    /// saved, and the errors of [`AuditableRepository::save`].
    pub fn restore(
        &self,
        uow: &mut UnitOfWork,
        object: &Tracked<T>,
        context: &DatabaseActionContext,
        rationale: &str,
    ) -> PersistenceResult<()> {
        self.set_deleted(uow, object, context, rationale, false)?;
        debug!(
            actor = context.actor_name(),
            table = T::TABLE,
            rationale,
            "restored"
        );
        Ok(())
    }

    fn set_deleted(
        &self,
        uow: &mut UnitOfWork,
        object: &Tracked<T>,
        context: &DatabaseActionContext,
        rationale: &str,
        deleted: bool,
    ) -> PersistenceResult<()> {
        validate_mutation(uow, rationale)?;
        if object.pk().is_none() {
            return Err(PersistenceError::MissingKey { table: T::TABLE });
        }
        {
            let mut entity = object.write();
            entity.on_pre_update();
            entity.set_deleted(deleted);
        }
        uow.transaction(|uow| write_audited(uow, object, context, rationale, WriteMode::Force))
            .map(|_| ())
    }

    /// Returns the history of row `pk`, oldest first, bounded by the
    /// half-open `timeframe` and restricted to `actor` when given.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store or the mapper fails.
    pub fn get_audit_trails(
        &self,
        uow: &mut UnitOfWork,
        pk: Pk,
        timeframe: Option<&Timeframe>,
        actor: Option<ActorKey>,
    ) -> PersistenceResult<Vec<AuditTrail<T>>> {
        let query = audit_trail_query(T::AUDIT_TABLE, pk, timeframe, actor);
        let mut trails = uow.transaction(|uow| {
            uow.strategy()
                .execute_query_with(&query, AuditTrail::<T>::from_record)
        })?;
        trails.sort_by(AuditTrail::chronological_cmp);
        Ok(trails)
    }

    /// Returns the history of row `pk` reduced to the entries where the
    /// extracted property changed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store or the mapper fails.
    pub fn get_audit_trails_for_property<V, E>(
        &self,
        uow: &mut UnitOfWork,
        pk: Pk,
        timeframe: Option<&Timeframe>,
        extractor: E,
    ) -> PersistenceResult<Vec<AuditTrail<T>>>
    where
        V: PartialEq,
        E: Fn(&T) -> V,
    {
        let trails = self.get_audit_trails(uow, pk, timeframe, None)?;
        Ok(collapse_by_property(trails, extractor))
    }

    /// Returns the history of row `pk` reduced to the entries where at least
    /// one tracked property changed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store or the mapper fails.
    pub fn get_audit_trails_for_properties(
        &self,
        uow: &mut UnitOfWork,
        pk: Pk,
        timeframe: Option<&Timeframe>,
        extractors: &[PropertyExtractor<'_, T>],
    ) -> PersistenceResult<Vec<AuditTrail<T>>> {
        let trails = self.get_audit_trails(uow, pk, timeframe, None)?;
        Ok(collapse_by_properties(trails, extractors))
    }
}

fn write_audited<T: Auditable>(
    uow: &mut UnitOfWork,
    object: &Tracked<T>,
    context: &DatabaseActionContext,
    rationale: &str,
    mode: WriteMode,
) -> PersistenceResult<bool> {
    let existing_pk = object.pk();
    let date = context.date();
    let mut strategy = uow.strategy();

    if let Some(pk) = existing_pk {
        if mode == WriteMode::SkipUnchanged {
            let stored = strategy.load_record(T::TABLE, pk)?;
            if stored == object.read().to_record() {
                debug!(
                    actor = context.actor_name(),
                    table = T::TABLE,
                    %pk,
                    rationale,
                    "redundant save"
                );
                return Ok(false);
            }
        }
    }

    stamp(object, existing_pk, date, mode)?;
    let stored = match existing_pk {
        None => strategy.insert(object)?,
        Some(_) => strategy.save(object)?,
    };
    let pk = stored
        .pk()
        .ok_or(PersistenceError::MissingKey { table: T::TABLE })?;
    stored.write().on_post_update();

    let history = AuditTrail::<T>::new_record(stored.read().to_record(), pk, context, rationale);
    strategy.insert_record(T::AUDIT_TABLE, &history)?;
    debug!(
        actor = context.actor_name(),
        table = T::TABLE,
        %pk,
        rationale,
        action = if existing_pk.is_some() { "update" } else { "insert" },
        "saved"
    );
    Ok(true)
}

fn stamp<T: Auditable>(
    object: &Tracked<T>,
    existing_pk: Option<Pk>,
    date: DateTime<Utc>,
    mode: WriteMode,
) -> PersistenceResult<()> {
    let mut entity = object.write();
    let Some(timestamps) = entity.timestamps_mut() else {
        return Ok(());
    };
    if mode == WriteMode::SkipUnchanged {
        if timestamps.is_after(date) {
            return Err(PersistenceError::BackdatedContext {
                table: T::TABLE,
                date,
            });
        }
        if existing_pk.is_none() && timestamps.creation_time.is_none() {
            timestamps.creation_time = Some(date);
        }
    }
    timestamps.last_update_time = Some(date);
    Ok(())
}
