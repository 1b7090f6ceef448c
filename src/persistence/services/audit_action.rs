//! Creation of audit actions and their action contexts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::info;

use crate::persistence::{
    domain::{
        AUDIT_ACTION_TABLE, Actor, AuditAction, DatabaseActionContext, Pk, Query,
        SYSTEM_ACTOR_NAME,
    },
    error::{PersistenceError, PersistenceResult},
    ports::StoreSession,
};

/// Persists audit actions stamped with the injected clock.
#[derive(Clone)]
pub struct AuditActionService {
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for AuditActionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditActionService").finish_non_exhaustive()
    }
}

impl AuditActionService {
    /// Creates a service reading "now" from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { clock }
    }

    /// Returns the current instant according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Persists a new audit action dated now and wraps it with `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::EmptyRationale`] for a blank rationale and
    /// [`PersistenceError::Store`] when the insert fails.
    pub fn create_audit_action_and_generate_context(
        &self,
        session: &mut dyn StoreSession,
        actor: Option<Actor>,
        rationale: &str,
    ) -> PersistenceResult<DatabaseActionContext> {
        self.create_audit_action_and_generate_context_at(session, actor, rationale, self.now())
    }

    /// Persists a new audit action with an explicit date.
    ///
    /// Used when initialising data with a chronology of its own.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::EmptyRationale`] for a blank rationale and
    /// [`PersistenceError::Store`] when the insert fails. Nothing is stored on
    /// error.
    pub fn create_audit_action_and_generate_context_at(
        &self,
        session: &mut dyn StoreSession,
        actor: Option<Actor>,
        rationale: &str,
        date: DateTime<Utc>,
    ) -> PersistenceResult<DatabaseActionContext> {
        if rationale.trim().is_empty() {
            return Err(PersistenceError::EmptyRationale);
        }
        let actor_key = actor.as_ref().map(Actor::key);
        let record = AuditAction::new_record(date, actor_key, rationale);
        let pk = session.insert(AUDIT_ACTION_TABLE, &record)?;
        let action = AuditAction::from_persisted(pk, date, actor_key, rationale);
        info!(
            action = %pk,
            actor = actor.as_ref().map_or(SYSTEM_ACTOR_NAME, Actor::name),
            date = %action.date(),
            "audit action created"
        );
        Ok(DatabaseActionContext::new(action, actor))
    }

    /// Loads a stored audit action.
    ///
    /// # Errors
    ///
    /// Returns [`crate::persistence::PersistenceError`] when the query or the
    /// mapping fails.
    pub fn load(
        &self,
        session: &mut dyn StoreSession,
        pk: Pk,
    ) -> PersistenceResult<Option<AuditAction>> {
        let rows = session.select(&Query::by_pk(AUDIT_ACTION_TABLE, pk))?;
        rows.first()
            .map(|row| AuditAction::from_record(row.pk, &row.record))
            .transpose()
            .map_err(Into::into)
    }
}
