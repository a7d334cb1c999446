// src/cache/snapshot.rs

//! Immutable metadata index snapshots.
//!
//! A snapshot is built in one pass from the per-year index artifacts and
//! published by replacing an `Arc` pointer; it is never mutated afterwards.
//! Readers therefore always see a fully-formed, self-consistent index no
//! matter how rebuilds race with them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{IpoSummary, MetaEntry};

/// Counters describing one rebuild pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotDiagnostics {
    /// Records in the snapshot
    pub records: usize,
    /// Year partitions loaded
    pub years: usize,
    /// Records dropped because the index entry was unusable
    pub parse_failures: usize,
    /// Slug collisions (later entry in load order won)
    pub duplicate_slugs: usize,
}

/// An immutable, versioned index of summary records.
#[derive(Debug)]
pub struct IndexSnapshot {
    /// Monotonic snapshot version; 0 means "never built"
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub diagnostics: SnapshotDiagnostics,
    by_slug: HashMap<String, Arc<IpoSummary>>,
    by_year: BTreeMap<i32, Vec<String>>,
}

impl IndexSnapshot {
    /// The placeholder published before the first rebuild.
    pub fn empty() -> Self {
        Self {
            version: 0,
            built_at: Utc::now(),
            diagnostics: SnapshotDiagnostics::default(),
            by_slug: HashMap::new(),
            by_year: BTreeMap::new(),
        }
    }

    /// Point lookup by slug.
    pub fn get(&self, slug: &str) -> Option<&Arc<IpoSummary>> {
        self.by_slug.get(slug)
    }

    /// Years present in this snapshot, newest first.
    pub fn years(&self) -> Vec<i32> {
        self.by_year.keys().rev().copied().collect()
    }

    /// Slugs of one year in scrape order, or `None` for an unknown year.
    pub fn year_slugs(&self, year: i32) -> Option<&[String]> {
        self.by_year.get(&year).map(Vec::as_slice)
    }

    /// All records of one year in scrape order, or `None` for an unknown year.
    pub fn iter_year(&self, year: i32) -> Option<impl Iterator<Item = &Arc<IpoSummary>>> {
        let slugs = self.by_year.get(&year)?;
        Some(slugs.iter().filter_map(|slug| self.by_slug.get(slug)))
    }

    /// All records, newest year first, scrape order within a year.
    pub fn iter_all(&self) -> impl Iterator<Item = &Arc<IpoSummary>> {
        self.by_year
            .iter()
            .rev()
            .flat_map(|(_, slugs)| slugs.iter())
            .filter_map(|slug| self.by_slug.get(slug))
    }

    /// Number of records in the snapshot.
    pub fn len(&self) -> usize {
        self.by_slug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }
}

/// Scratch structure a rebuild assembles before publishing.
///
/// Nothing here is visible to readers until [`build`](Self::build) and the
/// subsequent pointer swap.
pub struct SnapshotBuilder {
    version: u64,
    by_slug: HashMap<String, Arc<IpoSummary>>,
    by_year: BTreeMap<i32, Vec<String>>,
    diagnostics: SnapshotDiagnostics,
}

impl SnapshotBuilder {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            by_slug: HashMap::new(),
            by_year: BTreeMap::new(),
            diagnostics: SnapshotDiagnostics::default(),
        }
    }

    /// Fold one year's index entries into the scratch index.
    ///
    /// A duplicate slug is logged and counted; the entry from the newer
    /// year wins regardless of load order (within one year the later entry
    /// wins), and the loser is unlinked from its year so the slug->summary
    /// and year->slugs mappings stay consistent.
    pub fn add_year(&mut self, year: i32, entries: Vec<MetaEntry>) {
        self.diagnostics.years += 1;
        self.by_year.entry(year).or_default();
        for entry in entries {
            if entry.name.trim().is_empty() || entry.json_path.trim().is_empty() {
                log::warn!("Skipping index entry with empty name or json_path in year {year}");
                self.diagnostics.parse_failures += 1;
                continue;
            }

            let summary = Arc::new(IpoSummary::from_meta(entry, year));
            let slug = summary.slug.clone();

            if let Some(previous) = self.by_slug.get(&slug) {
                self.diagnostics.duplicate_slugs += 1;
                if previous.year > year {
                    log::warn!(
                        "Duplicate slug '{}': keeping year {}, dropping year {}",
                        slug,
                        previous.year,
                        year
                    );
                    continue;
                }
                log::warn!(
                    "Duplicate slug '{}' (year {} replaces year {})",
                    slug,
                    year,
                    previous.year
                );
                let previous_year = previous.year;
                if let Some(slugs) = self.by_year.get_mut(&previous_year) {
                    slugs.retain(|s| s != &slug);
                }
            }

            self.by_slug.insert(slug.clone(), summary);
            self.by_year.entry(year).or_default().push(slug);
        }
    }

    /// Finalize the snapshot.
    pub fn build(mut self) -> IndexSnapshot {
        self.diagnostics.records = self.by_slug.len();
        IndexSnapshot {
            version: self.version,
            built_at: Utc::now(),
            diagnostics: self.diagnostics,
            by_slug: self.by_slug,
            by_year: self.by_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> MetaEntry {
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
        }
    }

    #[test]
    fn test_build_preserves_scrape_order() {
        let mut builder = SnapshotBuilder::new(1);
        builder.add_year(2025, vec![entry("Beta Ltd"), entry("Alpha Ltd")]);
        let snapshot = builder.build();

        assert_eq!(
            snapshot.year_slugs(2025).unwrap(),
            &["beta-ltd".to_string(), "alpha-ltd".to_string()]
        );
    }

    #[test]
    fn test_years_newest_first() {
        let mut builder = SnapshotBuilder::new(1);
        builder.add_year(2024, vec![entry("Old Ltd")]);
        builder.add_year(2025, vec![entry("New Ltd")]);
        let snapshot = builder.build();

        assert_eq!(snapshot.years(), vec![2025, 2024]);
        let all: Vec<_> = snapshot.iter_all().map(|s| s.slug.as_str()).collect();
        assert_eq!(all, vec!["new-ltd", "old-ltd"]);
    }

    #[test]
    fn test_duplicate_slug_newer_year_wins_regardless_of_load_order() {
        // Newest-first, as rebuilds enumerate years
        let mut builder = SnapshotBuilder::new(1);
        builder.add_year(2025, vec![entry("Same Name Ltd")]);
        builder.add_year(2024, vec![entry("Same Name Ltd")]);
        let snapshot = builder.build();

        assert_eq!(snapshot.diagnostics.duplicate_slugs, 1);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("same-name-ltd").unwrap().year, 2025);
        assert_eq!(snapshot.year_slugs(2024).unwrap().len(), 0);

        // Oldest-first gives the same result
        let mut builder = SnapshotBuilder::new(2);
        builder.add_year(2024, vec![entry("Same Name Ltd")]);
        builder.add_year(2025, vec![entry("Same Name Ltd")]);
        let snapshot = builder.build();

        assert_eq!(snapshot.get("same-name-ltd").unwrap().year, 2025);
        assert_eq!(snapshot.year_slugs(2024).unwrap().len(), 0);
    }

    #[test]
    fn test_unusable_entries_counted_not_dropped_silently() {
        let mut bad = entry("Bad");
        bad.name = "  ".into();
        let mut builder = SnapshotBuilder::new(1);
        builder.add_year(2025, vec![bad, entry("Good Ltd")]);
        let snapshot = builder.build();

        assert_eq!(snapshot.diagnostics.parse_failures, 1);
        assert_eq!(snapshot.diagnostics.records, 1);
    }

    #[test]
    fn test_every_year_slug_resolves() {
        let mut builder = SnapshotBuilder::new(1);
        builder.add_year(2024, vec![entry("A Ltd"), entry("B Ltd")]);
        builder.add_year(2025, vec![entry("C Ltd"), entry("A Ltd")]);
        let snapshot = builder.build();

        for year in snapshot.years() {
            for slug in snapshot.year_slugs(year).unwrap() {
                assert!(snapshot.get(slug).is_some(), "dangling slug {slug}");
            }
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = IndexSnapshot::empty();
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.is_empty());
        assert!(snapshot.years().is_empty());
        assert!(snapshot.year_slugs(2025).is_none());
    }
}
