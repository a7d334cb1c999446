// src/cache/mod.rs

//! The metadata cache: immutable index snapshots, the single-flight detail
//! loader, and the manager that owns both.
//!
//! Ownership is strict: [`CacheManager`] is the only component that may
//! replace the published snapshot pointer; everything else gets read-only
//! `Arc` views.

mod details;
mod manager;
mod snapshot;

pub use details::DetailStore;
pub use manager::CacheManager;
pub use snapshot::{IndexSnapshot, SnapshotBuilder, SnapshotDiagnostics};
