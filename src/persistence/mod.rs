//! Audited persistence core.
//!
//! Guarantees one live instance per stored row within a unit of work,
//! mirrors every mutation of an audited entity into an append-only history
//! table linked to the unit's single audit action, and rebuilds change
//! timelines from that history.
//!
//! The layers follow the usual hexagonal split: pure `domain` types, the
//! `ports` record store contract with its `adapters`, the per-unit `cache`,
//! the `unit_of_work` transaction boundary, and the `services` built on top.

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod unit_of_work;

pub use error::{PersistenceError, PersistenceResult};
