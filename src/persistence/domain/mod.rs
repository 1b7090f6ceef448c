//! Pure domain types of the audited persistence core.
//!
//! Nothing here touches storage: records, queries, the entity contract,
//! actors, audit actions and history rows are plain values.

mod actor;
mod audit_action;
mod audit_trail;
mod context;
mod entity;
mod error;
mod ids;
mod query;
mod record;
mod timeframe;

pub use actor::{Actor, ActorKey, SYSTEM_ACTOR_NAME};
pub use audit_action::{AUDIT_ACTION_TABLE, AuditAction, truncate_to_millis};
pub use audit_trail::{AuditTrail, columns as audit_columns};
pub use context::DatabaseActionContext;
pub use entity::{Auditable, Entity, HardDeletable, SoftDeletable, Timestamps};
pub use error::{RecordMappingError, TimeframeError};
pub use ids::{Pk, UnitOfWorkId};
pub use query::{Condition, OrderBy, Query, SortOrder};
pub use record::{ColumnValue, DELETED_COLUMN, PK_COLUMN, Record, TIMESTAMP_PRECISION};
pub use timeframe::Timeframe;
