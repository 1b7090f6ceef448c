//! Contract implemented by every persisted entity type.

use super::{Pk, Record, RecordMappingError};
use chrono::{DateTime, Utc};

/// A persisted entity backed by one table.
///
/// Hydration is explicit: each entity maps itself to and from a [`Record`].
/// The primary key is never part of the record and is handled through
/// [`Entity::pk`] and [`Entity::set_pk`].
pub trait Entity: Send + Sync + Sized + 'static {
    /// Table holding the live rows.
    const TABLE: &'static str;

    /// Returns the primary key, or `None` before the first insert.
    fn pk(&self) -> Option<Pk>;

    /// Assigns the key generated on insert.
    fn set_pk(&mut self, pk: Pk);

    /// Writes every column except the primary key.
    fn to_record(&self) -> Record;

    /// Rebuilds an entity from its key and stored columns.
    ///
    /// Columns the entity does not know about must be ignored, so the same
    /// mapper can read history rows.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when a column is missing or ill-typed.
    fn from_record(pk: Pk, record: &Record) -> Result<Self, RecordMappingError>;

    /// Reattaches relationships after every fetch.
    fn on_post_load(&mut self) {}

    /// Runs before every write of the entity.
    fn on_pre_update(&mut self) {}

    /// Runs after every audited write of the entity, once its row is stored
    /// and before its history row is appended. Derived state kept outside
    /// the record is refreshed here.
    fn on_post_update(&mut self) {}

    /// Creation and last-update times maintained by the repository, when the
    /// entity tracks them.
    fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
        None
    }
}

/// An entity that is flagged deleted instead of being removed.
///
/// Implementors must write the flag to [`super::DELETED_COLUMN`] in
/// [`Entity::to_record`]; default finders filter on it.
pub trait SoftDeletable: Entity {
    /// Returns the soft-delete flag.
    fn is_deleted(&self) -> bool;

    /// Sets the soft-delete flag.
    fn set_deleted(&mut self, deleted: bool);
}

/// A soft-deletable entity whose every mutation is mirrored into an
/// append-only history table.
pub trait Auditable: SoftDeletable {
    /// Table holding the history rows.
    const AUDIT_TABLE: &'static str;
}

/// An auxiliary, non-audited entity that may be physically removed.
pub trait HardDeletable: Entity {}

/// Creation and last-update instants of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    /// Instant of the insert.
    pub creation_time: Option<DateTime<Utc>>,
    /// Instant of the latest write.
    pub last_update_time: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Timestamps of an entity that has never been written.
    #[must_use]
    pub const fn unset() -> Self {
        Self {
            creation_time: None,
            last_update_time: None,
        }
    }

    /// Returns `true` when `date` precedes the creation or last update.
    #[must_use]
    pub fn is_after(&self, date: DateTime<Utc>) -> bool {
        self.creation_time.is_some_and(|created| date < created)
            || self.last_update_time.is_some_and(|updated| date < updated)
    }
}
