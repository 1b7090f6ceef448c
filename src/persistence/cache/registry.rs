//! Binds one identity cache to each live unit of work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::identity_cache::{IdentityCache, SharedCache, lock_cache};
use crate::persistence::domain::UnitOfWorkId;

/// Thread-safe registry of identity caches keyed by unit of work.
///
/// Units of work running concurrently each get their own cache; nothing is
/// shared between them.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWorkRegistry {
    caches: Arc<Mutex<HashMap<UnitOfWorkId, SharedCache>>>,
}

impl UnitOfWorkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UnitOfWorkId, SharedCache>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cache bound to `unit`, creating it on first access.
    #[must_use]
    pub fn get_cache(&self, unit: UnitOfWorkId) -> SharedCache {
        let mut caches = self.lock();
        Arc::clone(caches.entry(unit).or_insert_with(|| {
            trace!(%unit, "identity cache created");
            Arc::new(Mutex::new(IdentityCache::new()))
        }))
    }

    /// Detaches and clears the cache bound to `unit`.
    ///
    /// Idempotent and infallible. Returns `true` when a cache was bound.
    pub fn empty_cache(&self, unit: UnitOfWorkId) -> bool {
        let detached = self.lock().remove(&unit);
        detached.is_some_and(|cache| {
            lock_cache(&cache).clear();
            trace!(%unit, "identity cache emptied");
            true
        })
    }

    /// Units of work that currently hold a cache.
    #[must_use]
    pub fn active_units(&self) -> Vec<UnitOfWorkId> {
        self.lock().keys().copied().collect()
    }

    /// Returns `true` when `unit` holds a cache.
    #[must_use]
    pub fn is_active(&self, unit: UnitOfWorkId) -> bool {
        self.lock().contains_key(&unit)
    }
}
