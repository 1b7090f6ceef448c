//! Audited persistence core of a clinical-trial data-capture backend.
//!
//! Every mutation of a tracked entity appends a full snapshot of its new
//! state to a per-entity history table, bound to one audit action naming
//! who acted, when and why. Units of work give each request a private
//! identity cache and a single outer transaction.
//!
//! # Architecture
//!
//! The persistence context follows hexagonal architecture principles:
//!
//! - **Domain**: entities, records, queries and audit types
//! - **Ports**: the record store and session traits
//! - **Adapters**: in-memory and `PostgreSQL` record stores
//! - **Services**: strategy, repositories and history reconstruction
//!
//! # Modules
//!
//! - [`persistence`]: identity caches, units of work and repositories
//! - [`config`]: layered configuration
//! - [`telemetry`]: tracing subscriber installation

pub mod config;
pub mod persistence;
pub mod telemetry;
