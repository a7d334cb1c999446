// src/dates.rs

//! Date parsing and IPO lifecycle classification.
//!
//! The scraper emits human-readable date strings ("May 14, 2025", sometimes
//! a combined "May 14, 2025toMay 16, 2025" range) alongside ISO-8601 dates.
//! This module turns those raw strings into a lifecycle status and a set of
//! "today" event tags. It is pure: "today" is always injected by the caller,
//! never read from the wall clock here.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an IPO relative to an injected date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpoStatus {
    Upcoming,
    Open,
    Closed,
    Unknown,
}

impl IpoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpoStatus::Upcoming => "Upcoming",
            IpoStatus::Open => "Open",
            IpoStatus::Closed => "Closed",
            IpoStatus::Unknown => "Unknown",
        }
    }
}

impl FromStr for IpoStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upcoming" => Ok(IpoStatus::Upcoming),
            "open" => Ok(IpoStatus::Open),
            "closed" => Ok(IpoStatus::Closed),
            "unknown" => Ok(IpoStatus::Unknown),
            _ => Err(()),
        }
    }
}

/// Calendar event tags for the "today" listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TodayEvent {
    #[serde(rename = "Opening Today")]
    OpeningToday,
    #[serde(rename = "Closing Today")]
    ClosingToday,
    #[serde(rename = "Listing Today")]
    ListingToday,
}

impl TodayEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodayEvent::OpeningToday => "Opening Today",
            TodayEvent::ClosingToday => "Closing Today",
            TodayEvent::ListingToday => "Listing Today",
        }
    }
}

/// Raw open/close/listing date strings as scraped.
///
/// Status is always derived from these at read time; nothing downstream
/// stores a precomputed status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDates {
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub listing: Option<String>,
}

impl RawDates {
    pub fn is_empty(&self) -> bool {
        self.open.is_none() && self.close.is_none() && self.listing.is_none()
    }

    /// Build from a combined "XtoY" range string plus an optional listing date.
    pub fn from_range(range: &str, listing: Option<&str>) -> Self {
        let (open, close) = split_date_range(range);
        Self {
            open: Some(open.to_string()),
            close: Some(close.to_string()),
            listing: listing.map(str::to_string),
        }
    }
}

/// Result of classifying one record's dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub status: Option<IpoStatus>,
    pub today_events: Vec<TodayEvent>,
}

impl Classification {
    /// Status with `Unknown` substituted when classification failed.
    pub fn status_or_unknown(&self) -> IpoStatus {
        self.status.unwrap_or(IpoStatus::Unknown)
    }
}

/// Parse a date string, trying each format the scraper is known to emit.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &[
        "%b %d, %Y",    // May 14, 2025
        "%a, %b %d, %Y", // Wed, May 14, 2025
        "%d %b %Y",     // 14 May 2025
        "%Y-%m-%d",     // 2025-05-14 (ISO-8601)
    ];

    let trimmed = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Split a combined "May 14, 2025toMay 16, 2025" range into open/close parts.
///
/// A string without the range marker is a single-day window: open == close.
pub fn split_date_range(raw: &str) -> (&str, &str) {
    static RANGE: OnceLock<Option<Regex>> = OnceLock::new();
    let range = RANGE.get_or_init(|| Regex::new(r"^(\w+ \d+, \d{4})to(\w+ \d+, \d{4})$").ok());

    let trimmed = raw.trim();
    match range.as_ref().and_then(|re| re.captures(trimmed)) {
        Some(caps) => {
            let open = caps.get(1).map_or(trimmed, |m| m.as_str());
            let close = caps.get(2).map_or(trimmed, |m| m.as_str());
            (open, close)
        }
        None => (trimmed, trimmed),
    }
}

/// Classify one record's raw dates against an injected `today`.
///
/// Rules: `Upcoming` before the open date, `Open` from open through close
/// (both inclusive), `Closed` after close; with no close date, a listing
/// date that has passed also means `Closed`. Unparseable or absent required
/// dates yield `status: None` (reported as `Unknown`) and no events; parse
/// failures never propagate as errors.
pub fn classify(dates: &RawDates, today: NaiveDate) -> Classification {
    let open = dates.open.as_deref().and_then(parse_flexible_date);
    let close = dates
        .close
        .as_deref()
        .and_then(parse_flexible_date)
        .or(open);
    let listing = dates.listing.as_deref().and_then(parse_flexible_date);

    let status = match (open, close) {
        (Some(open), Some(close)) => {
            if today < open {
                Some(IpoStatus::Upcoming)
            } else if today <= close {
                Some(IpoStatus::Open)
            } else {
                Some(IpoStatus::Closed)
            }
        }
        // No subscription window at all: a listing date that has passed is
        // still enough to call the IPO closed.
        _ => match listing {
            Some(listing) if today >= listing => Some(IpoStatus::Closed),
            _ => None,
        },
    };

    let mut today_events = Vec::new();
    if open == Some(today) {
        today_events.push(TodayEvent::OpeningToday);
    }
    if close == Some(today) {
        today_events.push(TodayEvent::ClosingToday);
    }
    if listing == Some(today) {
        today_events.push(TodayEvent::ListingToday);
    }

    Classification {
        status,
        today_events,
    }
}
