//! Port definitions for the audited persistence core.

pub mod store;

pub use store::{RecordStore, StoreError, StoreResult, StoreSession, StoredRow};
