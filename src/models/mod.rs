// src/models/mod.rs

//! Domain models for the IPO board service.
//!
//! Summary records are the lightweight rows the metadata index is built
//! from; detail documents are the full per-company JSON artifacts, loaded
//! lazily on first request.

mod detail;
mod summary;

// Re-export all public types
pub use detail::IpoDetail;
pub use summary::{IpoSummary, MetaEntry, SummaryView};
