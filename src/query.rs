// src/query.rs

//! The query façade consumed by the HTTP layer, one method per documented
//! endpoint.
//!
//! Every operation reads the published snapshot exactly once and classifies
//! against an injected `today`, so a single request can never observe a mix
//! of two snapshots or two clock readings. The `*_at` variants take `today`
//! explicitly; the plain variants use the current UTC date.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheManager;
use crate::dates::IpoStatus;
use crate::error::{AppError, Result};
use crate::models::SummaryView;
use crate::project;

/// Overview payload: per-status counts over the current year plus capped
/// head-of-list samples. Counts always reflect the full lists.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_ipos_current_year: usize,
    pub total_upcoming_ipos_count: usize,
    pub total_open_ipos_count: usize,
    pub total_closed_ipos_count: usize,
    pub total_unknown_ipos_count: usize,
    pub upcoming_ipos_list: Vec<SummaryView>,
    pub open_ipos_list: Vec<SummaryView>,
    pub closed_ipos_list: Vec<SummaryView>,
}

/// Acknowledgement returned by a manual cache clear.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub snapshot_version: u64,
    pub records: usize,
    pub years: usize,
    pub message: String,
}

/// Split a comma-separated `fields` query value into projection paths.
pub fn parse_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

/// Read-side façade over the cache.
pub struct QueryService {
    manager: Arc<CacheManager>,
    search_concurrency: usize,
}

impl QueryService {
    pub fn new(manager: Arc<CacheManager>, search_concurrency: usize) -> Self {
        Self {
            manager,
            search_concurrency: search_concurrency.max(1),
        }
    }

    fn current_date() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Years with data, newest first.
    pub async fn list_years(&self) -> Vec<i32> {
        self.manager.current().await.years()
    }

    /// All records across all years.
    pub async fn list_all(&self) -> Vec<SummaryView> {
        self.list_all_at(Self::current_date()).await
    }

    pub async fn list_all_at(&self, today: NaiveDate) -> Vec<SummaryView> {
        let snapshot = self.manager.current().await;
        snapshot.iter_all().map(|s| s.view(today)).collect()
    }

    /// Records of one year; an unknown year is NotFound, not an empty list.
    pub async fn list_by_year(&self, year: i32) -> Result<Vec<SummaryView>> {
        self.list_by_year_at(year, Self::current_date()).await
    }

    pub async fn list_by_year_at(&self, year: i32, today: NaiveDate) -> Result<Vec<SummaryView>> {
        let snapshot = self.manager.current().await;
        let records = snapshot
            .iter_year(year)
            .ok_or_else(|| AppError::not_found("year", year))?;
        Ok(records.map(|s| s.view(today)).collect())
    }

    /// Records matching a status token from `{upcoming, open, closed}`.
    pub async fn list_by_status(&self, token: &str) -> Result<Vec<SummaryView>> {
        self.list_by_status_at(token, Self::current_date()).await
    }

    pub async fn list_by_status_at(
        &self,
        token: &str,
        today: NaiveDate,
    ) -> Result<Vec<SummaryView>> {
        let wanted = parse_status_filter(token)?;
        let snapshot = self.manager.current().await;
        Ok(snapshot
            .iter_all()
            .filter(|s| s.status(today) == wanted)
            .map(|s| s.view(today))
            .collect())
    }

    /// Records with an opening/closing/listing event on `today`.
    pub async fn today(&self) -> Vec<SummaryView> {
        self.today_at(Self::current_date()).await
    }

    pub async fn today_at(&self, today: NaiveDate) -> Vec<SummaryView> {
        let snapshot = self.manager.current().await;
        snapshot
            .iter_all()
            .filter(|s| !s.classify(today).today_events.is_empty())
            .map(|s| s.view_with_events(today))
            .collect()
    }

    /// Case-insensitive substring search over names, plus descriptions for
    /// the current year (details loaded lazily, failures skipped).
    pub async fn search(&self, query: &str) -> Result<Vec<SummaryView>> {
        self.search_at(query, Self::current_date()).await
    }

    pub async fn search_at(&self, query: &str, today: NaiveDate) -> Result<Vec<SummaryView>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(AppError::invalid_argument("Missing search query"));
        }

        let snapshot = self.manager.current().await;
        let mut matches = Vec::new();
        let mut matched_slugs = HashSet::new();

        for summary in snapshot.iter_all() {
            if summary.name.to_lowercase().contains(&needle) {
                matched_slugs.insert(summary.slug.clone());
                matches.push(summary.view(today));
            }
        }

        // Description matching needs the detail documents; restrict the
        // lazy loads to the current year's still-unmatched candidates.
        let candidates: Vec<_> = snapshot
            .iter_year(today.year())
            .into_iter()
            .flatten()
            .filter(|s| !matched_slugs.contains(&s.slug))
            .cloned()
            .collect();

        let mut loads = stream::iter(candidates)
            .map(|summary| {
                let manager = Arc::clone(&self.manager);
                async move {
                    let loaded = manager.details().get(&summary).await;
                    (summary, loaded)
                }
            })
            .buffered(self.search_concurrency);

        while let Some((summary, loaded)) = loads.next().await {
            match loaded {
                Ok(detail) => {
                    let hit = detail
                        .description()
                        .is_some_and(|d| d.to_lowercase().contains(&needle));
                    if hit {
                        matches.push(summary.view(today));
                    }
                }
                // One unreadable record must not fail the search
                Err(e) => log::warn!("Skipping '{}' in description search: {e}", summary.slug),
            }
        }

        Ok(matches)
    }

    /// One-pass overview of the current year.
    pub async fn overview(&self, limit: Option<usize>) -> Overview {
        self.overview_at(limit, Self::current_date()).await
    }

    pub async fn overview_at(&self, limit: Option<usize>, today: NaiveDate) -> Overview {
        let snapshot = self.manager.current().await;

        let mut upcoming = Vec::new();
        let mut open = Vec::new();
        let mut closed = Vec::new();
        let mut unknown = 0usize;
        let mut total = 0usize;

        for summary in snapshot.iter_year(today.year()).into_iter().flatten() {
            total += 1;
            match summary.status(today) {
                IpoStatus::Upcoming => upcoming.push(summary.view(today)),
                IpoStatus::Open => open.push(summary.view(today)),
                IpoStatus::Closed => closed.push(summary.view(today)),
                IpoStatus::Unknown => unknown += 1,
            }
        }

        let counts = (upcoming.len(), open.len(), closed.len());
        // limit 0 or absent means unbounded
        if let Some(cap) = limit.filter(|cap| *cap > 0) {
            upcoming.truncate(cap);
            open.truncate(cap);
            closed.truncate(cap);
        }

        Overview {
            total_ipos_current_year: total,
            total_upcoming_ipos_count: counts.0,
            total_open_ipos_count: counts.1,
            total_closed_ipos_count: counts.2,
            total_unknown_ipos_count: unknown,
            upcoming_ipos_list: upcoming,
            open_ipos_list: open,
            closed_ipos_list: closed,
        }
    }

    /// Records listing on a given exchange (case-insensitive equality).
    /// No matches yield an empty list, not an error.
    pub async fn list_by_listing_type(&self, listing_type: &str) -> Vec<SummaryView> {
        self.list_by_listing_type_at(listing_type, Self::current_date())
            .await
    }

    pub async fn list_by_listing_type_at(
        &self,
        listing_type: &str,
        today: NaiveDate,
    ) -> Vec<SummaryView> {
        let snapshot = self.manager.current().await;
        snapshot
            .iter_all()
            .filter(|s| {
                s.listing_at
                    .as_deref()
                    .is_some_and(|at| at.eq_ignore_ascii_case(listing_type.trim()))
            })
            .map(|s| s.view(today))
            .collect()
    }

    /// Full detail document for a slug, optionally projected to `fields`.
    pub async fn get_detail(&self, slug: &str, fields: &[String]) -> Result<Value> {
        self.get_detail_at(slug, fields, Self::current_date()).await
    }

    pub async fn get_detail_at(
        &self,
        slug: &str,
        fields: &[String],
        today: NaiveDate,
    ) -> Result<Value> {
        let snapshot = self.manager.current().await;
        let summary = snapshot
            .get(slug)
            .ok_or_else(|| AppError::not_found("IPO", slug))?;

        let detail = self.manager.details().get(summary).await?;
        let document = detail.render(today);

        if fields.is_empty() {
            Ok(document)
        } else {
            Ok(project::project(&document, fields))
        }
    }

    /// Manual cache clear; acknowledges once the refreshed snapshot and the
    /// empty detail cache are both in place.
    pub async fn clear_cache(&self) -> Result<RefreshOutcome> {
        let snapshot = self.manager.clear_cache().await?;
        Ok(RefreshOutcome {
            snapshot_version: snapshot.version,
            records: snapshot.len(),
            years: snapshot.years().len(),
            message: "Cache cleared; metadata refreshed, details will reload on demand".into(),
        })
    }
}

/// Parse a status path token; the accepted set deliberately excludes
/// `unknown`, which is a degradation marker rather than a filter.
fn parse_status_filter(token: &str) -> Result<IpoStatus> {
    match token.trim().to_lowercase().as_str() {
        "upcoming" => Ok(IpoStatus::Upcoming),
        "open" => Ok(IpoStatus::Open),
        "closed" => Ok(IpoStatus::Closed),
        _ => Err(AppError::invalid_argument(format!(
            "Invalid status '{token}'. Must be one of: upcoming, open, closed"
        ))),
    }
}
