//! Immutable history rows of audited entities.

use super::{ActorKey, DatabaseActionContext, Entity, Pk, Record, RecordMappingError};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Metadata column names shared by every history table.
pub mod columns {
    /// Key of the live row the history row mirrors.
    pub const OBJECT_FK: &str = "audit_object_fk";
    /// Key of the audit action that caused the mutation.
    pub const ACTION_FK: &str = "audit_action_fk";
    /// Date of the audit action.
    pub const DATETIME: &str = "audit_datetime";
    /// Actor label at the time of the mutation.
    pub const ACTOR: &str = "audit_actor";
    /// Acting user key, if the actor is a user.
    pub const USER_FK: &str = "audit_user_fk";
    /// Acting robot key, if the actor is a robot.
    pub const ROBOT_FK: &str = "audit_robot_fk";
    /// Rationale given for the mutation.
    pub const CONTEXT: &str = "audit_context";
}

/// Full snapshot of an entity right after one mutation, with the audit
/// metadata of that mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditTrail<T> {
    pk: Pk,
    object_pk: Pk,
    action_pk: Pk,
    datetime: DateTime<Utc>,
    actor_name: String,
    actor: Option<ActorKey>,
    rationale: String,
    snapshot: T,
}

impl<T: Entity> AuditTrail<T> {
    /// Builds the history record for a mutation of the row `object_pk`.
    #[must_use]
    pub fn new_record(
        entity_record: Record,
        object_pk: Pk,
        context: &DatabaseActionContext,
        rationale: &str,
    ) -> Record {
        let actor = context.actor().map(super::Actor::key);
        let mut record = entity_record;
        record.set(columns::OBJECT_FK, object_pk);
        record.set(columns::ACTION_FK, context.audit_action().pk());
        record.set(columns::DATETIME, context.date());
        record.set(columns::ACTOR, context.actor_name());
        record.set(columns::USER_FK, actor.and_then(ActorKey::user_pk));
        record.set(columns::ROBOT_FK, actor.and_then(ActorKey::robot_pk));
        record.set(columns::CONTEXT, rationale);
        record
    }

    /// Maps a stored history row back to a trail entry and runs the
    /// snapshot's post-load hook.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when a metadata column is missing or
    /// the entity mapper rejects the snapshot.
    pub fn from_record(pk: Pk, record: &Record) -> Result<Self, RecordMappingError> {
        let object_pk = record.pk(columns::OBJECT_FK)?;
        let actor = ActorKey::from_columns(
            record.optional_pk(columns::USER_FK)?,
            record.optional_pk(columns::ROBOT_FK)?,
        );
        let mut snapshot = T::from_record(object_pk, record)?;
        snapshot.on_post_load();
        Ok(Self {
            pk,
            object_pk,
            action_pk: record.pk(columns::ACTION_FK)?,
            datetime: record.timestamp(columns::DATETIME)?,
            actor_name: record.text(columns::ACTOR)?.to_owned(),
            actor,
            rationale: record.text(columns::CONTEXT)?.to_owned(),
            snapshot,
        })
    }
}

impl<T> AuditTrail<T> {
    /// Key of the history row itself.
    #[must_use]
    pub const fn pk(&self) -> Pk {
        self.pk
    }

    /// Key of the live row.
    #[must_use]
    pub const fn object_pk(&self) -> Pk {
        self.object_pk
    }

    /// Key of the causal audit action.
    #[must_use]
    pub const fn action_pk(&self) -> Pk {
        self.action_pk
    }

    /// Date of the mutation.
    #[must_use]
    pub const fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    /// Actor label, `System` when no actor was attached.
    #[must_use]
    pub fn actor_name(&self) -> &str {
        &self.actor_name
    }

    /// Acting user or robot.
    #[must_use]
    pub const fn actor(&self) -> Option<ActorKey> {
        self.actor
    }

    /// Rationale of the mutation.
    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Entity state right after the mutation.
    #[must_use]
    pub const fn snapshot(&self) -> &T {
        &self.snapshot
    }

    /// Consumes the entry and returns the snapshot.
    #[must_use]
    pub fn into_snapshot(self) -> T {
        self.snapshot
    }

    /// Chronological order: date, then history row key.
    #[must_use]
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.datetime
            .cmp(&other.datetime)
            .then_with(|| self.pk.cmp(&other.pk))
    }
}
