//! Per-unit-of-work identity caches and their registry.

mod error;
mod identity_cache;
mod registry;

pub use error::CacheError;
pub use identity_cache::{IdentityCache, SharedCache, Tracked, lock_cache};
pub use registry::UnitOfWorkRegistry;
