//! Services of the audited persistence core.

pub mod audit_action;
pub mod auxiliary;
pub mod history;
pub mod repository;
pub mod strategy;

pub use audit_action::AuditActionService;
pub use auxiliary::AuxiliaryRepository;
pub use history::{
    PropertyExtractor, audit_trail_query, collapse_by_properties, collapse_by_property,
};
pub use repository::AuditableRepository;
pub use strategy::PersistenceStrategy;
