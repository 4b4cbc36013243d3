//! # atc24-core
//!
//! Core data model and state for the ATC24 hub.
//!
//! This crate provides:
//! - Data model types (Snapshot, Controller, AtisRecord, FlightPlan, ...)
//! - `BoundedLog`, the fixed-capacity newest-first record buffer
//! - `TtlCache`, a key/value cache with lazy per-entry expiry
//! - `SnapshotStore`, the single aggregate every consumer reads from
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! Callers pass timestamps and instants in explicitly, which keeps every
//! operation deterministic under test.

pub mod cache;
pub mod log;
pub mod model;
pub mod store;

pub use cache::{CacheEntry, TtlCache};
pub use log::BoundedLog;
pub use model::*;
pub use store::{HubStore, SnapshotStore};
