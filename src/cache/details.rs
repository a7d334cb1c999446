// src/cache/details.rs

//! Lazy, single-flight loading of per-company detail documents.
//!
//! The first request for a slug spawns one load task; concurrent requests
//! for the same slug await that task's shared result instead of issuing
//! their own disk reads. Loads for different slugs proceed fully in
//! parallel. The spawned task runs to completion even if every waiter is
//! cancelled, so late joiners never inherit a half-done load.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::{Mutex, oneshot};

use crate::error::{AppError, Result};
use crate::models::{IpoDetail, IpoSummary};
use crate::storage::ArtifactStore;

use super::snapshot::IndexSnapshot;

/// Cloneable failure carried through the shared load future.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub message: String,
}

type LoadResult = std::result::Result<Arc<IpoDetail>, LoadFailure>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Per-slug cache state.
enum EntryState {
    /// One load in flight; joiners clone and await this future. The
    /// generation ties the entry to the task that created it.
    Loading(SharedLoad, u64),
    Loaded(Arc<IpoDetail>),
    /// Served from cache until the retry grace period elapses
    Failed { message: String, at: Instant },
}

/// Cache of detail documents keyed by slug.
pub struct DetailStore {
    store: Arc<dyn ArtifactStore>,
    entries: Arc<Mutex<HashMap<String, EntryState>>>,
    next_generation: AtomicU64,
    load_timeout: Duration,
    failure_retry: Duration,
}

impl DetailStore {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        load_timeout: Duration,
        failure_retry: Duration,
    ) -> Self {
        Self {
            store,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            load_timeout,
            failure_retry,
        }
    }

    /// Get the detail document for a known summary, loading it on demand.
    ///
    /// The summary must come from the current snapshot; unknown slugs are
    /// rejected at the index layer before reaching here.
    pub async fn get(&self, summary: &IpoSummary) -> Result<Arc<IpoDetail>> {
        let shared = {
            let mut entries = self.entries.lock().await;
            match entries.get(&summary.slug) {
                Some(EntryState::Loaded(detail)) => return Ok(Arc::clone(detail)),
                Some(EntryState::Failed { message, at }) if at.elapsed() < self.failure_retry => {
                    return Err(AppError::detail_load(&summary.slug, message));
                }
                Some(EntryState::Loading(shared, _)) => shared.clone(),
                // Not started, or failed long enough ago to retry
                _ => {
                    let (shared, generation) = self.spawn_load(summary);
                    entries.insert(
                        summary.slug.clone(),
                        EntryState::Loading(shared.clone(), generation),
                    );
                    shared
                }
            }
        };

        match shared.await {
            Ok(detail) => Ok(detail),
            Err(failure) => Err(AppError::detail_load(&summary.slug, failure.message)),
        }
    }

    /// Spawn the single in-flight load for a slug.
    ///
    /// The task owns the read and the state transition; waiters observe the
    /// result through a shared future fed by a oneshot, so dropping every
    /// waiter does not cancel the load.
    fn spawn_load(&self, summary: &IpoSummary) -> (SharedLoad, u64) {
        let slug = summary.slug.clone();
        let json_path = summary.json_path.clone();
        let year = summary.year;
        let store = Arc::clone(&self.store);
        let entries = Arc::clone(&self.entries);
        let timeout = self.load_timeout;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = load_detail(store, &slug, year, &json_path, timeout).await;

            let state = match &result {
                Ok(detail) => EntryState::Loaded(Arc::clone(detail)),
                Err(failure) => EntryState::Failed {
                    message: failure.message.clone(),
                    at: Instant::now(),
                },
            };
            let mut entries = entries.lock().await;
            // Only transition the entry this task owns; a clear() may have
            // removed it, and a newer load may have replaced it since
            if matches!(entries.get(&slug), Some(EntryState::Loading(_, g)) if *g == generation) {
                entries.insert(slug, state);
            }
            drop(entries);

            let _ = tx.send(result);
        });

        let shared = rx.map(|received| {
            received.unwrap_or_else(|_| {
                Err(LoadFailure {
                    message: "detail load task dropped before completion".into(),
                })
            })
        })
        .boxed()
        .shared();
        (shared, generation)
    }

    /// Drop entries invalidated by a freshly published snapshot: the slug is
    /// gone, or its artifact moved (`json_path`/year changed). Warm entries
    /// and in-flight loads survive.
    pub async fn retain(&self, snapshot: &IndexSnapshot) {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|slug, state| match state {
            EntryState::Loading(..) => true,
            EntryState::Loaded(detail) => snapshot
                .get(slug)
                .is_some_and(|s| s.json_path == detail.json_path && s.year == detail.year),
            EntryState::Failed { .. } => snapshot.get(slug).is_some(),
        });
        let dropped = before - entries.len();
        if dropped > 0 {
            log::info!("Invalidated {dropped} detail cache entries after rebuild");
        }
    }

    /// Drop every cached entry (manual cache clear).
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of cached entries, for diagnostics.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Perform one detail load with a bounded timeout.
async fn load_detail(
    store: Arc<dyn ArtifactStore>,
    slug: &str,
    year: i32,
    json_path: &str,
    timeout: Duration,
) -> LoadResult {
    let failure = |message: String| {
        log::warn!("Detail load failed for '{slug}': {message}");
        Err(LoadFailure { message })
    };

    match tokio::time::timeout(timeout, store.read_detail(json_path)).await {
        Err(_) => failure(format!("timed out after {timeout:?}")),
        Ok(Err(e)) => failure(e.to_string()),
        Ok(Ok(None)) => failure(format!("artifact not found: {json_path}")),
        Ok(Ok(Some(document))) => {
            log::info!("Loaded detail for '{slug}' from {json_path}");
            Ok(Arc::new(IpoDetail::from_document(
                slug, year, json_path, document,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::cache::snapshot::SnapshotBuilder;
    use crate::models::MetaEntry;

    /// Fake store that counts reads and can delay or fail them.
    struct CountingStore {
        reads: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicUsize::new(0),
                delay,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: true,
            })
        }

        fn read_count(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactStore for CountingStore {
        async fn list_years(&self) -> crate::error::Result<Vec<i32>> {
            Ok(vec![2025])
        }

        async fn read_year_index(
            &self,
            _year: i32,
        ) -> crate::error::Result<Option<Vec<MetaEntry>>> {
            Ok(Some(Vec::new()))
        }

        async fn read_detail(&self, json_path: &str) -> crate::error::Result<Option<Value>> {
            let seq = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Ok(None);
            }
            Ok(Some(json!({
                "source": json_path,
                "seq": seq,
                "ipo_details": [["IPO Date", "May 14, 2025toMay 16, 2025"]]
            })))
        }
    }

    fn sample_summary(name: &str) -> IpoSummary {
        IpoSummary::from_meta(
            MetaEntry {
                name: name.into(),
                url: String::new(),
                html_path: String::new(),
                json_path: format!("2025/json/{}.json", name.replace(' ', "_")),
                open_date: None,
                close_date: None,
                listing_date: None,
                listing_at: None,
                status: None,
            },
            2025,
        )
    }

    fn store_with(backend: Arc<CountingStore>, retry: Duration) -> DetailStore {
        DetailStore::new(backend, Duration::from_secs(5), retry)
    }

    #[tokio::test]
    async fn test_load_and_cache() {
        let backend = CountingStore::new();
        let details = store_with(Arc::clone(&backend), Duration::from_secs(30));
        let summary = sample_summary("Exitel Technologies Ltd");

        let first = details.get(&summary).await.unwrap();
        let second = details.get(&summary).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.read_count(), 1);
        assert_eq!(first.dates.open.as_deref(), Some("May 14, 2025"));
    }

    #[tokio::test]
    async fn test_single_flight_under_concurrency() {
        let backend = CountingStore::slow(Duration::from_millis(50));
        let details = Arc::new(store_with(Arc::clone(&backend), Duration::from_secs(30)));
        let summary = Arc::new(sample_summary("Exitel Technologies Ltd"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let details = Arc::clone(&details);
                let summary = Arc::clone(&summary);
                tokio::spawn(async move { details.get(&summary).await.unwrap() })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        assert_eq!(backend.read_count(), 1);
        for detail in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], detail));
        }
    }

    #[tokio::test]
    async fn test_different_slugs_load_independently() {
        let backend = CountingStore::new();
        let details = store_with(Arc::clone(&backend), Duration::from_secs(30));

        details.get(&sample_summary("Alpha Ltd")).await.unwrap();
        details.get(&sample_summary("Beta Ltd")).await.unwrap();

        assert_eq!(backend.read_count(), 2);
        assert_eq!(details.len().await, 2);
    }

    #[tokio::test]
    async fn test_failure_cached_within_grace_period() {
        let backend = CountingStore::failing();
        let details = store_with(Arc::clone(&backend), Duration::from_secs(30));
        let summary = sample_summary("Ghost Ltd");

        assert!(details.get(&summary).await.is_err());
        assert!(details.get(&summary).await.is_err());

        // Second call served from the cached failure
        assert_eq!(backend.read_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_retried_after_grace_period() {
        let backend = CountingStore::failing();
        let details = store_with(Arc::clone(&backend), Duration::ZERO);
        let summary = sample_summary("Ghost Ltd");

        assert!(details.get(&summary).await.is_err());
        assert!(details.get(&summary).await.is_err());

        assert_eq!(backend.read_count(), 2);
    }

    #[tokio::test]
    async fn test_load_survives_waiter_cancellation() {
        let backend = CountingStore::slow(Duration::from_millis(50));
        let details = Arc::new(store_with(Arc::clone(&backend), Duration::from_secs(30)));
        let summary = Arc::new(sample_summary("Exitel Technologies Ltd"));

        let waiter = {
            let details = Arc::clone(&details);
            let summary = Arc::clone(&summary);
            tokio::spawn(async move { details.get(&summary).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        let _ = waiter.await;

        // The underlying load keeps running; a later caller shares it
        let detail = details.get(&summary).await.unwrap();
        assert_eq!(backend.read_count(), 1);
        assert_eq!(detail.slug, "exitel-technologies-ltd");
    }

    #[tokio::test]
    async fn test_load_started_before_clear_cannot_overwrite_newer_load() {
        let backend = CountingStore::slow(Duration::from_millis(50));
        let details = Arc::new(store_with(Arc::clone(&backend), Duration::from_secs(30)));
        let summary = Arc::new(sample_summary("Exitel Technologies Ltd"));

        // First load in flight, then the cache is cleared under it
        let first = {
            let details = Arc::clone(&details);
            let summary = Arc::clone(&summary);
            tokio::spawn(async move { details.get(&summary).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        details.clear().await;

        // A fresh request after the clear spawns a second load
        let second = {
            let details = Arc::clone(&details);
            let summary = Arc::clone(&summary);
            tokio::spawn(async move { details.get(&summary).await })
        };

        first.await.unwrap().unwrap();
        let fresh = second.await.unwrap().unwrap();
        assert_eq!(fresh.document["seq"], 2);

        // The pre-clear load finished first but must not have committed its
        // stale result over the second load's entry
        let cached = details.get(&summary).await.unwrap();
        assert_eq!(cached.document["seq"], 2);
        assert_eq!(backend.read_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_transitions_to_failed() {
        let backend = CountingStore::slow(Duration::from_millis(200));
        let details = DetailStore::new(
            Arc::clone(&backend) as Arc<dyn ArtifactStore>,
            Duration::from_millis(20),
            Duration::from_secs(30),
        );
        let summary = sample_summary("Slow Ltd");

        let err = details.get(&summary).await.unwrap_err();
        assert!(matches!(err, AppError::DetailLoad { .. }));
    }

    #[tokio::test]
    async fn test_retain_drops_moved_and_missing_slugs() {
        let backend = CountingStore::new();
        let details = store_with(Arc::clone(&backend), Duration::from_secs(30));

        let kept = sample_summary("Kept Ltd");
        let moved = sample_summary("Moved Ltd");
        let gone = sample_summary("Gone Ltd");
        for summary in [&kept, &moved, &gone] {
            details.get(summary).await.unwrap();
        }
        assert_eq!(details.len().await, 3);

        // New snapshot: kept unchanged, moved has a new json_path, gone absent
        let mut builder = SnapshotBuilder::new(2);
        builder.add_year(
            2025,
            vec![
                MetaEntry {
                    name: "Kept Ltd".into(),
                    url: String::new(),
                    html_path: String::new(),
                    json_path: "2025/json/Kept_Ltd.json".into(),
                    open_date: None,
                    close_date: None,
                    listing_date: None,
                    listing_at: None,
                    status: None,
                },
                MetaEntry {
                    name: "Moved Ltd".into(),
                    url: String::new(),
                    html_path: String::new(),
                    json_path: "2025/json/Moved_Ltd_v2.json".into(),
                    open_date: None,
                    close_date: None,
                    listing_date: None,
                    listing_at: None,
                    status: None,
                },
            ],
        );
        details.retain(&builder.build()).await;

        assert_eq!(details.len().await, 1);

        // Re-fetching the moved record issues a fresh read
        details
            .get(&IpoSummary {
                json_path: "2025/json/Moved_Ltd_v2.json".into(),
                ..moved
            })
            .await
            .unwrap();
        assert_eq!(backend.read_count(), 4);
    }

    #[tokio::test]
    async fn test_clear_forces_reload() {
        let backend = CountingStore::new();
        let details = store_with(Arc::clone(&backend), Duration::from_secs(30));
        let summary = sample_summary("Exitel Technologies Ltd");

        details.get(&summary).await.unwrap();
        details.clear().await;
        assert_eq!(details.len().await, 0);

        details.get(&summary).await.unwrap();
        assert_eq!(backend.read_count(), 2);
    }
}
