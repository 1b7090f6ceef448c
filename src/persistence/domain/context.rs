//! Value threaded through every mutating persistence call.

use super::{Actor, AuditAction, SYSTEM_ACTOR_NAME};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Pairs the unit of work's [`AuditAction`] with the actor performing the
/// current operation.
///
/// The actor can be dropped with [`DatabaseActionContext::to_system_action`]
/// when a sub-operation runs in a system capacity; the audit action stays the
/// same, so no second causal root is created.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use trial_persistence::persistence::domain::{
///     Actor, AuditAction, DatabaseActionContext, Pk,
/// };
///
/// let actor = Actor::user(Pk::new(7), "investigator");
/// let action = AuditAction::from_persisted(Pk::new(1), Utc::now(), Some(actor.key()), "Save form");
/// let context = DatabaseActionContext::new(action, Some(actor));
///
/// let system = context.to_system_action();
/// assert_eq!(system.audit_action().pk(), context.audit_action().pk());
/// assert_eq!(system.actor_name(), "System");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseActionContext {
    audit_action: Arc<AuditAction>,
    actor: Option<Actor>,
}

impl DatabaseActionContext {
    /// Wraps an audit action with the acting identity.
    #[must_use]
    pub fn new(audit_action: AuditAction, actor: Option<Actor>) -> Self {
        Self {
            audit_action: Arc::new(audit_action),
            actor,
        }
    }

    /// Returns the shared audit action.
    #[must_use]
    pub fn audit_action(&self) -> &AuditAction {
        &self.audit_action
    }

    /// Returns the actor, `None` for the system.
    #[must_use]
    pub const fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Returns the label recorded in history rows.
    #[must_use]
    pub fn actor_name(&self) -> &str {
        self.actor.as_ref().map_or(SYSTEM_ACTOR_NAME, Actor::name)
    }

    /// Returns the action date.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        self.audit_action.date()
    }

    /// Returns a context sharing the same audit action without an actor.
    #[must_use]
    pub fn to_system_action(&self) -> Self {
        Self {
            audit_action: Arc::clone(&self.audit_action),
            actor: None,
        }
    }

    /// Returns `true` when both contexts descend from the same stored action.
    #[must_use]
    pub fn shares_action_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.audit_action, &other.audit_action)
            || self.audit_action.pk() == other.audit_action.pk()
    }
}
