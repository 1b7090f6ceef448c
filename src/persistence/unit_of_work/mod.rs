//! Units of work: one session, one identity cache, one outer transaction
//! and at most one audit action.
//!
//! A [`UnitOfWork`] is passed explicitly to every repository call. Its
//! [`UnitOfWork::transaction`] is re-entrant: only the outermost call opens
//! and closes a store transaction, and only that start may create the audit
//! action. Completion, through [`UnitOfWork::finish`] or drop, empties the
//! unit's identity cache exactly once.

mod boundary;
mod runner;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

pub use boundary::{AuditActionBoundary, TransactionBoundaryHook, TransactionStart};
pub use runner::UnitOfWorkFactory;

use crate::persistence::{
    cache::{SharedCache, UnitOfWorkRegistry},
    domain::{Actor, DatabaseActionContext, UnitOfWorkId},
    error::{PersistenceError, PersistenceResult},
    ports::StoreSession,
    services::{AuditActionService, PersistenceStrategy},
};

/// Who acts and why, for units of work whose audit action is created
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditIntent {
    actor: Option<Actor>,
    rationale: String,
}

impl AuditIntent {
    /// Creates an intent; `None` acts as the system.
    #[must_use]
    pub fn new(actor: Option<Actor>, rationale: impl Into<String>) -> Self {
        Self {
            actor,
            rationale: rationale.into(),
        }
    }

    /// Acting identity.
    #[must_use]
    pub const fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Rationale stored on the audit action.
    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }
}

/// How a unit of work obtains its action context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOfWorkKind {
    /// The audit action is created at the first transaction start, as for
    /// an inbound request.
    Audited(AuditIntent),
    /// Reads only; every mutation is rejected.
    ReadOnly,
    /// The caller builds the context explicitly, as scheduled tasks and
    /// tests do.
    Manual,
}

impl UnitOfWorkKind {
    /// Shorthand for an audited unit of work.
    #[must_use]
    pub fn audited(actor: Option<Actor>, rationale: impl Into<String>) -> Self {
        Self::Audited(AuditIntent::new(actor, rationale))
    }
}

/// One logical unit of work.
pub struct UnitOfWork {
    id: UnitOfWorkId,
    kind: UnitOfWorkKind,
    session: Box<dyn StoreSession>,
    registry: UnitOfWorkRegistry,
    audit_actions: AuditActionService,
    hook: Arc<dyn TransactionBoundaryHook>,
    context: Option<DatabaseActionContext>,
    provisional_context: bool,
    depth: usize,
    finished: bool,
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("context", &self.context)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl UnitOfWork {
    pub(crate) fn new(
        kind: UnitOfWorkKind,
        session: Box<dyn StoreSession>,
        registry: UnitOfWorkRegistry,
        audit_actions: AuditActionService,
        hook: Arc<dyn TransactionBoundaryHook>,
    ) -> Self {
        Self {
            id: UnitOfWorkId::new(),
            kind,
            session,
            registry,
            audit_actions,
            hook,
            context: None,
            provisional_context: false,
            depth: 0,
            finished: false,
        }
    }

    /// Execution identity, also the key of the identity cache.
    #[must_use]
    pub const fn id(&self) -> UnitOfWorkId {
        self.id
    }

    /// Kind of the unit of work.
    #[must_use]
    pub const fn kind(&self) -> &UnitOfWorkKind {
        &self.kind
    }

    /// Returns `true` for read-only units of work.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self.kind, UnitOfWorkKind::ReadOnly)
    }

    /// Returns `true` while a transaction is open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// The attached action context, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&DatabaseActionContext> {
        self.context.as_ref()
    }

    /// Returns the attached action context.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::MissingContext`] when none is attached.
    pub fn require_context(&self) -> PersistenceResult<DatabaseActionContext> {
        self.context.clone().ok_or(PersistenceError::MissingContext)
    }

    /// Returns the identity cache of this unit, creating it on first use.
    #[must_use]
    pub fn cache(&self) -> SharedCache {
        self.registry.get_cache(self.id)
    }

    /// Low-level operations over this unit's session and cache.
    pub fn strategy(&mut self) -> PersistenceStrategy<'_> {
        let cache = self.cache();
        PersistenceStrategy::new(&mut *self.session, cache)
    }

    /// Creates and attaches the action context of a manual unit of work.
    ///
    /// A unit of work holds at most one audit action: when a context is
    /// already attached it is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ReadOnlyUnitOfWork`] for read-only units,
    /// [`PersistenceError::EmptyRationale`] for a blank rationale and
    /// [`PersistenceError::Store`] when the insert fails.
    pub fn create_context(
        &mut self,
        actor: Option<Actor>,
        rationale: &str,
    ) -> PersistenceResult<DatabaseActionContext> {
        let date = self.audit_actions.now();
        self.create_context_at(actor, rationale, date)
    }

    /// Like [`UnitOfWork::create_context`], with an explicit action date.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ReadOnlyUnitOfWork`] for read-only units,
    /// [`PersistenceError::EmptyRationale`] for a blank rationale and
    /// [`PersistenceError::Store`] when the insert fails.
    pub fn create_context_at(
        &mut self,
        actor: Option<Actor>,
        rationale: &str,
        date: DateTime<Utc>,
    ) -> PersistenceResult<DatabaseActionContext> {
        if self.is_read_only() {
            return Err(PersistenceError::ReadOnlyUnitOfWork);
        }
        if let Some(existing) = &self.context {
            debug!(unit = %self.id, action = %existing.audit_action().pk(), "reusing audit action");
            return Ok(existing.clone());
        }
        let context = self.audit_actions.create_audit_action_and_generate_context_at(
            &mut *self.session,
            actor,
            rationale,
            date,
        )?;
        self.context = Some(context.clone());
        self.provisional_context = self.in_transaction();
        Ok(context)
    }

    /// Runs `work` inside the unit's transaction.
    ///
    /// The outermost call opens the store transaction, lets the boundary
    /// hook attach the audit action, commits when `work` succeeds and rolls
    /// back when it fails. Nested calls join the open transaction.
    ///
    /// On rollback the identity cache is emptied and a context created
    /// inside the transaction is withdrawn.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::AuditActionUnavailable`] when the hook
    /// fails (`work` does not run), any error of `work`, or the store error
    /// of a failed begin or commit.
    pub fn transaction<R, F>(&mut self, work: F) -> PersistenceResult<R>
    where
        F: FnOnce(&mut Self) -> PersistenceResult<R>,
    {
        let newly_started = self.depth == 0;
        if newly_started {
            self.session.begin()?;
        }
        let started = self.hook.transaction_started(TransactionStart {
            session: &mut *self.session,
            kind: &self.kind,
            newly_started,
            current_context: self.context.as_ref(),
        });
        match started {
            Ok(Some(context)) => {
                self.context = Some(context);
                self.provisional_context = true;
            }
            Ok(None) => {}
            Err(err) if newly_started => {
                self.abort();
                return Err(PersistenceError::audit_action_unavailable(err));
            }
            Err(err) => return Err(err),
        }

        self.depth += 1;
        let outcome = work(self);
        self.depth -= 1;
        if !newly_started {
            return outcome;
        }

        match outcome {
            Ok(value) => match self.session.commit() {
                Ok(()) => {
                    self.provisional_context = false;
                    Ok(value)
                }
                Err(err) => {
                    self.discard_transaction_state();
                    Err(err.into())
                }
            },
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    fn abort(&mut self) {
        if self.session.in_transaction() {
            if let Err(err) = self.session.rollback() {
                warn!(unit = %self.id, error = %err, "transaction rollback failed");
            }
        }
        self.discard_transaction_state();
    }

    fn discard_transaction_state(&mut self) {
        if self.provisional_context {
            self.context = None;
            self.provisional_context = false;
        }
        self.registry.empty_cache(self.id);
        debug!(unit = %self.id, "transaction rolled back");
    }

    /// Completes the unit of work: rolls back anything left open and
    /// empties the identity cache.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Store`] when an abandoned transaction
    /// cannot be rolled back. The cache is emptied regardless.
    pub fn finish(mut self) -> PersistenceResult<()> {
        self.complete()
    }

    fn complete(&mut self) -> PersistenceResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let rollback = if self.session.in_transaction() {
            self.session.rollback()
        } else {
            Ok(())
        };
        self.registry.empty_cache(self.id);
        rollback.map_err(Into::into)
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if let Err(err) = self.complete() {
            warn!(unit = %self.id, error = %err, "unit of work cleanup failed");
        }
    }
}
