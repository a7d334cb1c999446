// src/models/summary.rs

//! Lightweight per-IPO summary records and their serialized views.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::{self, Classification, IpoStatus, RawDates, TodayEvent};
use crate::slug::slugify;

/// One record of a per-year index artifact, as written by the scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaEntry {
    /// Company name
    pub name: String,

    /// Source listing URL
    #[serde(default)]
    pub url: String,

    /// Location of the scraped HTML artifact, relative to the data root
    #[serde(default)]
    pub html_path: String,

    /// Location of the parsed JSON detail artifact, relative to the data root
    pub json_path: String,

    /// Raw subscription open date, if the scraper extracted one
    #[serde(default)]
    pub open_date: Option<String>,

    /// Raw subscription close date
    #[serde(default)]
    pub close_date: Option<String>,

    /// Raw listing date
    #[serde(default)]
    pub listing_date: Option<String>,

    /// Listing exchange, e.g. "NSE SME"
    #[serde(default)]
    pub listing_at: Option<String>,

    /// Status hint from the scraper, used only when the dates fail to parse
    #[serde(default)]
    pub status: Option<String>,
}

/// An in-memory summary record, immutable once built into a snapshot.
///
/// Holds raw date strings only; status is derived at read time so that a
/// long-lived snapshot never serves a stale lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpoSummary {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub html_path: String,
    pub json_path: String,
    pub year: i32,
    pub dates: RawDates,
    pub listing_at: Option<String>,
    pub status_hint: Option<IpoStatus>,
}

impl IpoSummary {
    /// Build a summary from an index-artifact record.
    pub fn from_meta(entry: MetaEntry, year: i32) -> Self {
        let slug = slugify(&entry.name);
        let status_hint = entry.status.as_deref().and_then(|s| s.parse().ok());
        Self {
            name: entry.name,
            slug,
            url: entry.url,
            html_path: entry.html_path,
            json_path: entry.json_path,
            year,
            dates: RawDates {
                open: entry.open_date,
                close: entry.close_date,
                listing: entry.listing_date,
            },
            listing_at: entry.listing_at,
            status_hint,
        }
    }

    /// Classify this record's dates against an injected `today`.
    pub fn classify(&self, today: NaiveDate) -> Classification {
        dates::classify(&self.dates, today)
    }

    /// Derived status, falling back to the scraper's hint when the raw
    /// dates are absent or unparseable.
    pub fn status(&self, today: NaiveDate) -> IpoStatus {
        self.classify(today)
            .status
            .or(self.status_hint)
            .unwrap_or(IpoStatus::Unknown)
    }

    /// Serialized listing view with the status computed for `today`.
    pub fn view(&self, today: NaiveDate) -> SummaryView {
        SummaryView {
            name: self.name.clone(),
            slug: self.slug.clone(),
            url: self.url.clone(),
            html_path: self.html_path.clone(),
            json_path: self.json_path.clone(),
            year: self.year,
            status: self.status(today),
            listing_at: self.listing_at.clone(),
            today_events: None,
        }
    }

    /// Like [`view`](Self::view), additionally carrying the record's
    /// today-event tags.
    pub fn view_with_events(&self, today: NaiveDate) -> SummaryView {
        let classification = self.classify(today);
        let mut view = self.view(today);
        view.today_events = Some(classification.today_events);
        view
    }
}

/// The wire shape of one listing row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryView {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub html_path: String,
    pub json_path: String,
    pub year: i32,
    pub status: IpoStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub today_events: Option<Vec<TodayEvent>>,
}
