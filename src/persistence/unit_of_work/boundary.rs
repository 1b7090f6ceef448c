//! Hook invoked whenever a unit of work opens a transaction.

use crate::persistence::{
    domain::DatabaseActionContext, error::PersistenceResult, ports::StoreSession,
    services::AuditActionService,
};

use super::UnitOfWorkKind;

/// Facts about a transaction that is being opened.
pub struct TransactionStart<'a> {
    /// Session the transaction runs on.
    pub session: &'a mut dyn StoreSession,
    /// Kind of the unit of work.
    pub kind: &'a UnitOfWorkKind,
    /// `true` for the outermost transaction, `false` for nested ones.
    pub newly_started: bool,
    /// Context already attached to the unit of work, if any.
    pub current_context: Option<&'a DatabaseActionContext>,
}

/// Observer of transaction starts.
///
/// Returning a context attaches it to the unit of work. When the hook fails
/// for an outermost transaction, that transaction is rolled back and the
/// work it guards never runs.
pub trait TransactionBoundaryHook: Send + Sync {
    /// Called right after a transaction is opened, and for every nested
    /// transaction with `newly_started` set to `false`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::persistence::PersistenceError`] when the hook cannot
    /// prepare the transaction.
    fn transaction_started(
        &self,
        start: TransactionStart<'_>,
    ) -> PersistenceResult<Option<DatabaseActionContext>>;
}

/// Creates the audit action of an audited unit of work at its first
/// transaction start.
#[derive(Debug, Clone)]
pub struct AuditActionBoundary {
    audit_actions: AuditActionService,
}

impl AuditActionBoundary {
    /// Creates the hook over an audit action service.
    #[must_use]
    pub const fn new(audit_actions: AuditActionService) -> Self {
        Self { audit_actions }
    }
}

impl TransactionBoundaryHook for AuditActionBoundary {
    fn transaction_started(
        &self,
        start: TransactionStart<'_>,
    ) -> PersistenceResult<Option<DatabaseActionContext>> {
        let UnitOfWorkKind::Audited(intent) = start.kind else {
            return Ok(None);
        };
        if !start.newly_started || start.current_context.is_some() {
            return Ok(None);
        }
        self.audit_actions
            .create_audit_action_and_generate_context(
                start.session,
                intent.actor().cloned(),
                intent.rationale(),
            )
            .map(Some)
    }
}
