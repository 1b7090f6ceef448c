//! Opens units of work and runs them on blocking workers.

use std::sync::Arc;

use mockable::Clock;

use super::{AuditActionBoundary, TransactionBoundaryHook, UnitOfWork, UnitOfWorkKind};
use crate::persistence::{
    cache::UnitOfWorkRegistry,
    error::{PersistenceError, PersistenceResult},
    ports::RecordStore,
    services::AuditActionService,
};

/// Entry point for units of work over one record store.
///
/// Cheap to clone; clones share the store, the cache registry and the
/// boundary hook.
#[derive(Clone)]
pub struct UnitOfWorkFactory {
    store: Arc<dyn RecordStore>,
    registry: UnitOfWorkRegistry,
    audit_actions: AuditActionService,
    hook: Arc<dyn TransactionBoundaryHook>,
}

impl std::fmt::Debug for UnitOfWorkFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWorkFactory")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl UnitOfWorkFactory {
    /// Creates a factory whose audited units create their audit action at
    /// the first transaction start.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let audit_actions = AuditActionService::new(clock);
        let hook = Arc::new(AuditActionBoundary::new(audit_actions.clone()));
        Self {
            store,
            registry: UnitOfWorkRegistry::new(),
            audit_actions,
            hook,
        }
    }

    /// Replaces the transaction boundary hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn TransactionBoundaryHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Registry holding the identity caches of live units of work.
    #[must_use]
    pub const fn registry(&self) -> &UnitOfWorkRegistry {
        &self.registry
    }

    /// Service creating audit actions.
    #[must_use]
    pub const fn audit_actions(&self) -> &AuditActionService {
        &self.audit_actions
    }

    /// Opens a unit of work on a new session.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Store`] when no session can be opened.
    pub fn begin(&self, kind: UnitOfWorkKind) -> PersistenceResult<UnitOfWork> {
        let session = self.store.open_session()?;
        Ok(UnitOfWork::new(
            kind,
            session,
            self.registry.clone(),
            self.audit_actions.clone(),
            Arc::clone(&self.hook),
        ))
    }

    /// Runs `work` as one unit of work inside one outer transaction, then
    /// completes the unit whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the error of [`UnitOfWorkFactory::begin`], of the transaction,
    /// or of the completion step, in that order of precedence.
    pub fn run_blocking<R, F>(&self, kind: UnitOfWorkKind, work: F) -> PersistenceResult<R>
    where
        F: FnOnce(&mut UnitOfWork) -> PersistenceResult<R>,
    {
        let mut unit = self.begin(kind)?;
        let outcome = unit.transaction(work);
        let completion = unit.finish();
        let value = outcome?;
        completion?;
        Ok(value)
    }

    /// Runs `work` with [`UnitOfWorkFactory::run_blocking`] on Tokio's
    /// blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::TaskJoin`] when the worker panics, or any
    /// error of [`UnitOfWorkFactory::run_blocking`].
    pub async fn run<R, F>(&self, kind: UnitOfWorkKind, work: F) -> PersistenceResult<R>
    where
        F: FnOnce(&mut UnitOfWork) -> PersistenceResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let factory = self.clone();
        tokio::task::spawn_blocking(move || factory.run_blocking(kind, work))
            .await
            .map_err(|err| PersistenceError::TaskJoin(err.to_string()))?
    }
}
