//! Adapter implementations of the record store port.

pub mod memory;
pub mod postgres;
