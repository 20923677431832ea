//! Listing-page extraction and article enrichment.
//!
//! One candidate moves through these submodules in order:
//!
//! | Step | Module | Notes |
//! |------|--------|-------|
//! | Locate items | [`extract`] | Per-source selector rules from the config table |
//! | Generic scan | [`fallback`] | Ranked generic selectors, used when the rules find nothing |
//! | Resolve links | [`links`] | Relative and protocol-relative hrefs against the page URL |
//! | Collapse duplicates | [`dedupe`] | By URL across sources, then by normalized title |
//! | Summarize | [`enrich`] | Lead paragraph or embedded media from the article page |
//!
//! Everything that touches a parsed [`scraper::Html`] is synchronous: documents
//! are parsed, queried and dropped between two fetches so they never cross an
//! `.await`.

pub mod dedupe;
pub mod enrich;
pub mod extract;
pub mod fallback;
pub mod links;

use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

pub(crate) static ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("anchor selector is valid"));

/// Elements whose text is considered when looking for a teaser.
pub(crate) static BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, div, span").expect("block selector is valid"));

/// Visible text of an element, whitespace-collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Headline text of an element, falling back to its `title` attribute.
pub(crate) fn headline_text(element: ElementRef<'_>) -> String {
    let text = element_text(element);
    if !text.is_empty() {
        return text;
    }
    element
        .value()
        .attr("title")
        .map(collapse_whitespace)
        .unwrap_or_default()
}

pub(crate) fn is_anchor(element: ElementRef<'_>) -> bool {
    element.value().name().eq_ignore_ascii_case("a")
}
