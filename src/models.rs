//! Data models for scraped candidates and the published snapshot.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Candidate`]: Unvalidated item pulled off a listing page
//! - [`NewsItem`]: Enriched item returned to consumers
//! - [`CategoryResult`]: Ordered, bounded list of items for one category
//! - [`AggregateSnapshot`]: Everything one refresh pass produced
//!
//! The serialized field names of [`NewsItem`] and [`AggregateSnapshot`] are the
//! handoff format read by the web page and by anything warming the cache from
//! the persisted file, so they must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// A news item as found on a listing page, before deduplication and enrichment.
///
/// Candidates only live for the duration of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Headline text, whitespace-collapsed. Never empty.
    pub title: String,
    /// Absolute http(s) link to the article.
    pub url: Url,
    /// Teaser text from the listing, possibly empty.
    pub raw_summary: String,
    /// Declared name of the source the listing came from.
    pub source: String,
}

/// A fully processed news item.
///
/// `summary_html` is either empty, a single `<p>` paragraph, or a single
/// embeddable `<iframe>`/`<video>` fragment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsItem {
    /// The article headline.
    pub title: String,
    /// The absolute article URL.
    pub url: String,
    /// Short summary fragment taken from the article page.
    pub summary_html: String,
    /// Display name of the publishing site.
    pub source: String,
    /// Publication time if the article page declared one.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    /// Build an item without a summary, used when enrichment degrades.
    pub fn bare(candidate: &Candidate, source: String) -> Self {
        Self {
            title: candidate.title.clone(),
            url: candidate.url.to_string(),
            summary_html: String::new(),
            source,
            published_at: None,
        }
    }
}

/// Ordered items for a single category.
pub type CategoryResult = Vec<NewsItem>;

/// The complete result of one refresh pass.
///
/// A snapshot is never edited after construction; the published one is
/// replaced wholesale (see [`crate::snapshot::SnapshotStore`]).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AggregateSnapshot {
    /// When the pass that produced this snapshot finished.
    pub timestamp: Option<DateTime<Utc>>,
    /// Sum of all category lengths.
    pub total_items: usize,
    /// Category id to its items.
    pub categories: BTreeMap<String, CategoryResult>,
}

impl AggregateSnapshot {
    /// The empty snapshot published at process start.
    pub fn empty() -> Self {
        Self {
            timestamp: None,
            total_items: 0,
            categories: BTreeMap::new(),
        }
    }

    /// Assemble a snapshot, computing `total_items` from the categories.
    pub fn new(categories: BTreeMap<String, CategoryResult>, timestamp: DateTime<Utc>) -> Self {
        let total_items = categories.values().map(Vec::len).sum();
        Self {
            timestamp: Some(timestamp),
            total_items,
            categories,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }

    /// Items of one category, empty if the category is unknown.
    pub fn category(&self, id: &str) -> &[NewsItem] {
        self.categories.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for AggregateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(title: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            summary_html: String::new(),
            source: "Example".to_string(),
            published_at: None,
        }
    }

    #[test]
    fn test_snapshot_counts_items() {
        let mut categories = BTreeMap::new();
        categories.insert("mobile".to_string(), vec![item("a"), item("b")]);
        categories.insert("chip".to_string(), vec![item("c")]);
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();

        let snapshot = AggregateSnapshot::new(categories, ts);
        assert_eq!(snapshot.total_items, 3);
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.category("mobile").len(), 2);
        assert!(snapshot.category("os").is_empty());
    }

    #[test]
    fn test_snapshot_serialization_shape() {
        let mut categories = BTreeMap::new();
        categories.insert("mobile".to_string(), vec![item("a")]);
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let snapshot = AggregateSnapshot::new(categories, ts);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["total_items"], 1);
        assert_eq!(value["timestamp"], "2026-10-16T08:00:00Z");
        assert_eq!(value["categories"]["mobile"][0]["title"], "a");
        assert!(value["categories"]["mobile"][0]["summary_html"].is_string());
        assert!(value["categories"]["mobile"][0]["published_at"].is_null());
    }

    #[test]
    fn test_empty_snapshot_deserialization() {
        let json = r#"{"timestamp": null, "total_items": 0, "categories": {}}"#;
        let snapshot: AggregateSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot, AggregateSnapshot::empty());
    }
}
