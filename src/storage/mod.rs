// src/storage/mod.rs

//! Storage abstractions over the scraper-produced data tree.
//!
//! The external scraper writes one index artifact per year plus one JSON
//! detail artifact per company:
//!
//! ```text
//! <data_dir>/
//! └── 2025/
//!     ├── current_meta.json                     # per-year index artifact
//!     └── json/
//!         └── Exitel_Technologies_Ltd_IPO.json  # per-company detail
//! ```
//!
//! The cache only consumes this tree; it never writes to it. The trait seam
//! exists so tests can inject counting or failing stores.

pub mod local;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::MetaEntry;

// Re-export for convenience
pub use local::LocalStore;

/// Read-only access to the scraper's artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Years that have a readable index artifact, newest first.
    async fn list_years(&self) -> Result<Vec<i32>>;

    /// Parse one year's index artifact.
    ///
    /// `Ok(None)` when the artifact does not exist; `Err` when it exists
    /// but cannot be read or parsed.
    async fn read_year_index(&self, year: i32) -> Result<Option<Vec<MetaEntry>>>;

    /// Parse one company's detail artifact, addressed by the `json_path`
    /// recorded in the index (relative to the data root).
    async fn read_detail(&self, json_path: &str) -> Result<Option<Value>>;
}
