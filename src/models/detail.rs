// src/models/detail.rs

//! Full per-company detail documents, loaded lazily.

use chrono::NaiveDate;
use serde_json::Value;

use crate::dates::{self, RawDates};

/// Labels inside the `ipo_details` pair list that carry dates.
const LABEL_IPO_DATE: &str = "IPO Date";
const LABEL_LISTING_DATE: &str = "Listing Date";

/// A company's full detail document plus the bits the cache needs to keep
/// the derived status fresh.
///
/// The document itself is free-form JSON produced by the external parser;
/// `ipo_details` inside it is an ordered list of `[label, value]` pairs
/// (labels may repeat, so it is never collapsed into a map).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpoDetail {
    pub slug: String,
    pub year: i32,
    pub json_path: String,
    pub document: Value,
    pub dates: RawDates,
}

impl IpoDetail {
    /// Wrap a parsed detail document, extracting the raw dates from its
    /// `ipo_details` section.
    pub fn from_document(
        slug: impl Into<String>,
        year: i32,
        json_path: impl Into<String>,
        document: Value,
    ) -> Self {
        let dates = extract_dates(&document);
        Self {
            slug: slug.into(),
            year,
            json_path: json_path.into(),
            document,
            dates,
        }
    }

    /// First `ipo_details` value carrying the given label.
    pub fn detail_value(&self, label: &str) -> Option<&str> {
        detail_pairs(&self.document)
            .find(|(l, _)| *l == label)
            .map(|(_, v)| v)
    }

    /// The company description used by free-text search.
    pub fn description(&self) -> Option<&str> {
        self.document
            .get("about_company")?
            .get("description")?
            .as_str()
    }

    /// Render the response document: a clone of the source document with
    /// the status freshly computed for `today`.
    pub fn render(&self, today: NaiveDate) -> Value {
        let status = dates::classify(&self.dates, today).status_or_unknown();
        let mut doc = self.document.clone();
        if let Value::Object(map) = &mut doc {
            map.insert("status".into(), Value::String(status.as_str().into()));
        }
        doc
    }
}

/// Iterate the `[label, value]` pairs of a document's `ipo_details` section.
fn detail_pairs(document: &Value) -> impl Iterator<Item = (&str, &str)> {
    document
        .get("ipo_details")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|pair| {
            let items = pair.as_array()?;
            Some((items.first()?.as_str()?, items.get(1)?.as_str()?))
        })
}

/// Pull the raw open/close/listing dates out of the `ipo_details` pairs.
///
/// The "IPO Date" value may be a combined "XtoY" range or a single date.
fn extract_dates(document: &Value) -> RawDates {
    let mut ipo_date = None;
    let mut listing_date = None;
    for (label, value) in detail_pairs(document) {
        match label {
            LABEL_IPO_DATE if ipo_date.is_none() => ipo_date = Some(value),
            LABEL_LISTING_DATE if listing_date.is_none() => listing_date = Some(value),
            _ => {}
        }
    }

    match ipo_date {
        Some(range) => RawDates::from_range(range, listing_date),
        None => RawDates {
            open: None,
            close: None,
            listing: listing_date.map(str::to_string),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "about_company": {
                "description": "Broadband and internet services provider."
            },
            "company_contact_details": {
                "company_name": "Exitel Technologies Ltd"
            },
            "ipo_details": [
                ["IPO Date", "May 14, 2025toMay 16, 2025"],
                ["Listing Date", "May 21, 2025"],
                ["Listing At", "NSE SME"],
                ["Issue Price", "₹ 61 per share"],
                ["Issue Price", "₹ 61 per share"]
            ],
            "important_dates": {
                "allotment": "2025-05-19"
            }
        })
    }

    fn sample_detail() -> IpoDetail {
        IpoDetail::from_document(
            "exitel-technologies-ltd",
            2025,
            "2025/json/Exitel_Technologies_Ltd_IPO.json",
            sample_document(),
        )
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extracts_range_and_listing() {
        let detail = sample_detail();
        assert_eq!(detail.dates.open.as_deref(), Some("May 14, 2025"));
        assert_eq!(detail.dates.close.as_deref(), Some("May 16, 2025"));
        assert_eq!(detail.dates.listing.as_deref(), Some("May 21, 2025"));
    }

    #[test]
    fn test_single_date_window() {
        let doc = json!({ "ipo_details": [["IPO Date", "May 14, 2025"]] });
        let detail = IpoDetail::from_document("x", 2025, "p", doc);
        assert_eq!(detail.dates.open, detail.dates.close);
    }

    #[test]
    fn test_duplicate_labels_survive() {
        let detail = sample_detail();
        let prices: Vec<_> = detail_pairs(&detail.document)
            .filter(|(l, _)| *l == "Issue Price")
            .collect();
        assert_eq!(prices.len(), 2);
    }

    #[test]
    fn test_detail_value_first_match() {
        let detail = sample_detail();
        assert_eq!(detail.detail_value("Listing At"), Some("NSE SME"));
        assert_eq!(detail.detail_value("No Such Label"), None);
    }

    #[test]
    fn test_description() {
        let detail = sample_detail();
        assert_eq!(
            detail.description(),
            Some("Broadband and internet services provider.")
        );
    }

    #[test]
    fn test_render_injects_fresh_status() {
        let detail = sample_detail();

        let open = detail.render(day(2025, 5, 15));
        assert_eq!(open["status"], "Open");

        let closed = detail.render(day(2025, 6, 1));
        assert_eq!(closed["status"], "Closed");

        // Source document is untouched
        assert!(detail.document.get("status").is_none());
    }

    #[test]
    fn test_missing_sections_degrade_gracefully() {
        let detail = IpoDetail::from_document("x", 2025, "p", json!({ "other": 1 }));
        assert!(detail.dates.is_empty());
        assert!(detail.description().is_none());
        assert_eq!(detail.render(day(2025, 5, 15))["status"], "Unknown");
    }
}
