// src/cache/manager.rs

//! Snapshot ownership and the rebuild protocol.
//!
//! The manager is the only component allowed to replace the published
//! snapshot pointer. Rebuilds assemble a scratch index and swap it in
//! atomically; a failed rebuild leaves the previous snapshot published,
//! because stale data beats no data for a read-mostly service.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::CacheConfig;
use crate::error::{AppError, Result};
use crate::storage::ArtifactStore;

use super::details::DetailStore;
use super::snapshot::{IndexSnapshot, SnapshotBuilder};

/// Owner of the metadata index snapshot and the detail cache.
pub struct CacheManager {
    store: Arc<dyn ArtifactStore>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    details: DetailStore,
    next_version: AtomicU64,
    config: CacheConfig,
}

impl CacheManager {
    pub fn new(store: Arc<dyn ArtifactStore>, config: CacheConfig) -> Self {
        let details = DetailStore::new(
            Arc::clone(&store),
            config.detail_timeout(),
            config.failure_retry(),
        );
        Self {
            store,
            snapshot: RwLock::new(Arc::new(IndexSnapshot::empty())),
            details,
            next_version: AtomicU64::new(1),
            config,
        }
    }

    /// The currently published snapshot.
    ///
    /// Callers hold the returned `Arc` for the whole request so every read
    /// within it sees one consistent index, regardless of concurrent swaps.
    pub async fn current(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// The lazy detail cache.
    pub fn details(&self) -> &DetailStore {
        &self.details
    }

    /// Rebuild the index from disk and publish the new snapshot.
    ///
    /// An unreadable year partition or a blown deadline fails the whole
    /// rebuild without touching the published snapshot. An unusable record
    /// inside a readable partition only degrades that record.
    pub async fn rebuild(&self) -> Result<Arc<IndexSnapshot>> {
        let deadline = self.config.rebuild_timeout();
        let built = match tokio::time::timeout(deadline, self.build_snapshot()).await {
            Err(_) => {
                let err = AppError::rebuild(format!("timed out after {deadline:?}"));
                log::error!("{err}; previous snapshot retained");
                return Err(err);
            }
            Ok(Err(e)) => {
                let err = AppError::rebuild(e);
                log::error!("{err}; previous snapshot retained");
                return Err(err);
            }
            Ok(Ok(snapshot)) => Arc::new(snapshot),
        };

        *self.snapshot.write().await = Arc::clone(&built);
        self.details.retain(&built).await;

        let d = &built.diagnostics;
        log::info!(
            "Published snapshot v{}: {} records across {} years ({} parse failures, {} duplicate slugs)",
            built.version,
            d.records,
            d.years,
            d.parse_failures,
            d.duplicate_slugs
        );
        Ok(built)
    }

    async fn build_snapshot(&self) -> Result<IndexSnapshot> {
        let years = self.store.list_years().await?;
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let mut builder = SnapshotBuilder::new(version);

        for year in years {
            match self.store.read_year_index(year).await? {
                Some(entries) => builder.add_year(year, entries),
                // The index vanished between enumeration and read; the
                // scraper is mid-write, skip this partition for now
                None => log::warn!("Year {year} index disappeared during rebuild"),
            }
        }

        Ok(builder.build())
    }

    /// Manual cache clear: refresh the index, then drop every cached
    /// detail. A valid snapshot stays published throughout; the call
    /// acknowledges only once both are in place.
    pub async fn clear_cache(&self) -> Result<Arc<IndexSnapshot>> {
        let snapshot = self.rebuild().await?;
        self.details.clear().await;
        log::info!("Detail cache cleared; records will reload on demand");
        Ok(snapshot)
    }

    /// Spawn the periodic refresh loop (default every 4 hours).
    ///
    /// Failures are logged and the loop keeps running with the previous
    /// snapshot published.
    pub fn start_refresh_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.refresh_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the initial build is explicit
            ticker.tick().await;
            loop {
                ticker.tick().await;
                log::info!("Scheduled cache refresh starting");
                if let Err(e) = manager.rebuild().await {
                    log::error!("Scheduled rebuild failed: {e}");
                }
            }
        })
    }
}
