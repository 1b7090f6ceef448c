//! Step definitions for audited dataset scenarios.

pub mod given;
pub mod then;
