//! In-memory transactional record store.

mod store;

pub use store::{InMemoryRecordStore, InMemorySession};
