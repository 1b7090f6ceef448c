//! The causal root shared by every mutation of one unit of work.

use super::{ActorKey, Pk, Record, RecordMappingError};
use chrono::{DateTime, Utc};

/// Table holding audit actions.
pub const AUDIT_ACTION_TABLE: &str = "audit_action";

const DATE_COLUMN: &str = "date";
const USER_FK_COLUMN: &str = "user_fk";
const ROBOT_FK_COLUMN: &str = "robot_fk";
const CONTEXT_COLUMN: &str = "context";

/// Persisted "who, why and when" of a unit of work's mutations.
///
/// Immutable once stored. The date is truncated to milliseconds so that an
/// instance built in memory compares equal to the same row reloaded from
/// storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditAction {
    pk: Pk,
    date: DateTime<Utc>,
    actor: Option<ActorKey>,
    context: String,
}

impl AuditAction {
    /// Rebuilds an audit action from its persisted parts.
    #[must_use]
    pub fn from_persisted(
        pk: Pk,
        date: DateTime<Utc>,
        actor: Option<ActorKey>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            pk,
            date: truncate_to_millis(date),
            actor,
            context: context.into(),
        }
    }

    /// Returns the action key.
    #[must_use]
    pub const fn pk(&self) -> Pk {
        self.pk
    }

    /// Returns the millisecond-precision action date.
    #[must_use]
    pub const fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Returns the acting user or robot, `None` for the system.
    #[must_use]
    pub const fn actor(&self) -> Option<ActorKey> {
        self.actor
    }

    /// Returns the acting user key, if any.
    #[must_use]
    pub fn user_fk(&self) -> Option<Pk> {
        self.actor.and_then(ActorKey::user_pk)
    }

    /// Returns the acting robot key, if any.
    #[must_use]
    pub fn robot_fk(&self) -> Option<Pk> {
        self.actor.and_then(ActorKey::robot_pk)
    }

    /// Returns the free-text rationale.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Builds the record of a not yet persisted action.
    #[must_use]
    pub fn new_record(date: DateTime<Utc>, actor: Option<ActorKey>, context: &str) -> Record {
        Record::new()
            .with(DATE_COLUMN, truncate_to_millis(date))
            .with(USER_FK_COLUMN, actor.and_then(ActorKey::user_pk))
            .with(ROBOT_FK_COLUMN, actor.and_then(ActorKey::robot_pk))
            .with(CONTEXT_COLUMN, context)
    }

    /// Maps a stored row back to an action.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when a column is missing or ill-typed.
    pub fn from_record(pk: Pk, record: &Record) -> Result<Self, RecordMappingError> {
        let actor = ActorKey::from_columns(
            record.optional_pk(USER_FK_COLUMN)?,
            record.optional_pk(ROBOT_FK_COLUMN)?,
        );
        Ok(Self::from_persisted(
            pk,
            record.timestamp(DATE_COLUMN)?,
            actor,
            record.text(CONTEXT_COLUMN)?,
        ))
    }
}

/// Truncates an instant to millisecond precision, the storage precision of
/// audit dates.
#[must_use]
pub fn truncate_to_millis(date: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(date.timestamp_millis()).unwrap_or(date)
}
