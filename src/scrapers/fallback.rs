//! Generic listing scan for pages without (working) site rules.
//!
//! [`FallbackChain`] is an ordered list of generic selectors. The first one
//! that matches more than `fallback_min_matches` elements *and* produces at
//! least one candidate is adopted; a handful of matches is more likely a
//! sidebar or footer than the listing itself.

use super::links::resolve;
use super::{ANCHOR, BLOCK, element_text, headline_text, is_anchor};
use crate::models::Candidate;
use crate::scrapers::extract::ExtractLimits;
use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Generic selectors in priority order.
pub const GENERIC_SELECTORS: [&str; 10] = [
    "article",
    ".article",
    ".news-item",
    ".item",
    ".post",
    "li a",
    ".title a",
    "h3 a",
    "h2 a",
    ".headline a",
];

static GENERIC_CHAIN: Lazy<FallbackChain> = Lazy::new(|| {
    FallbackChain::from_selectors(&GENERIC_SELECTORS).expect("generic selectors are valid")
});

/// One generic selector with the label it is logged under.
#[derive(Debug, Clone)]
pub struct FallbackRule {
    pub label: String,
    pub selector: Selector,
}

/// Generic selectors tried in priority order with an early-accept threshold.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    rules: Vec<FallbackRule>,
}

impl FallbackChain {
    /// The shared chain built from [`GENERIC_SELECTORS`].
    pub fn generic() -> &'static FallbackChain {
        &GENERIC_CHAIN
    }

    /// Build a chain from selector strings, keeping their order.
    ///
    /// # Arguments
    ///
    /// * `selectors` - CSS selectors, highest priority first
    ///
    /// # Returns
    ///
    /// The chain, or a message naming the first selector that does not parse.
    pub fn from_selectors(selectors: &[&str]) -> Result<Self, String> {
        let rules = selectors
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map(|selector| FallbackRule {
                        label: s.to_string(),
                        selector,
                    })
                    .map_err(|e| format!("{s}: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// Run the chain against a parsed page.
    ///
    /// # Arguments
    ///
    /// * `document` - The parsed page
    /// * `base` - URL the page was fetched from
    /// * `source_name` - Written into every candidate's `source`
    /// * `limits` - `fallback_min_matches`, `per_source_limit` and teaser bounds
    ///
    /// # Returns
    ///
    /// Candidates from the first selector that matches more than
    /// `fallback_min_matches` elements and yields at least one candidate, or
    /// an empty list.
    pub fn extract(
        &self,
        document: &Html,
        base: &Url,
        source_name: &str,
        limits: &ExtractLimits,
    ) -> Vec<Candidate> {
        for rule in &self.rules {
            let matches: Vec<ElementRef<'_>> = document.select(&rule.selector).collect();
            if matches.len() <= limits.fallback_min_matches {
                continue;
            }

            let candidates: Vec<Candidate> = matches
                .into_iter()
                .take(limits.per_source_limit)
                .filter_map(|element| candidate_from_match(element, base, source_name, limits))
                .collect();
            if !candidates.is_empty() {
                debug!(selector = %rule.label, count = candidates.len(), "Adopted generic selector");
                return candidates;
            }
        }
        Vec::new()
    }
}

/// Scan markup with the generic chain only.
pub fn extract_generic(
    markup: &str,
    base: &Url,
    source_name: &str,
    limits: &ExtractLimits,
) -> Vec<Candidate> {
    let document = Html::parse_document(markup);
    FallbackChain::generic().extract(&document, base, source_name, limits)
}

fn candidate_from_match(
    element: ElementRef<'_>,
    base: &Url,
    source_name: &str,
    limits: &ExtractLimits,
) -> Option<Candidate> {
    let (anchor, container) = if is_anchor(element) {
        let parent = element.parent().and_then(ElementRef::wrap);
        (element, parent)
    } else {
        (element.select(&ANCHOR).next()?, Some(element))
    };

    let title = headline_text(anchor);
    let href = anchor.value().attr("href").map(str::trim).unwrap_or_default();
    if title.is_empty() || href.is_empty() {
        return None;
    }

    let raw_summary = container
        .map(|c| nearby_summary(c, &title, limits))
        .unwrap_or_default();

    Some(Candidate {
        url: resolve(href, base),
        title,
        raw_summary,
        source: source_name.to_string(),
    })
}

/// First block text long enough to be a teaser that is not part of the title.
fn nearby_summary(container: ElementRef<'_>, title: &str, limits: &ExtractLimits) -> String {
    container
        .select(&BLOCK)
        .map(element_text)
        .find(|text| text.chars().count() >= limits.min_summary_chars && !title.contains(text.as_str()))
        .map(|text| truncate_chars(&text, limits.summary_max_chars))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_threshold_skips_incidental_matches() {
        // Three <article>s are not enough; four list anchors are.
        let html = r#"
            <article><a href="/a1">Article one</a></article>
            <article><a href="/a2">Article two</a></article>
            <article><a href="/a3">Article three</a></article>
            <ul>
              <li><a href="/l1">List one</a></li>
              <li><a href="/l2">List two</a></li>
              <li><a href="/l3">List three</a></li>
              <li><a href="/l4">List four</a></li>
            </ul>
        "#;
        let candidates = extract_generic(html, &base(), "Site", &ExtractLimits::default());
        let titles: Vec<_> = candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["List one", "List two", "List three", "List four"]);
    }

    #[test]
    fn test_container_matches_use_descendant_link_and_summary() {
        let html: String = (0..5)
            .map(|i| {
                format!(
                    r#"<article><h2><a href="/s/{i}">Story {i}</a></h2>
                       <p>Story {i}</p>
                       <p>A longer teaser paragraph for story number {i}.</p></article>"#
                )
            })
            .collect();
        let candidates = extract_generic(&html, &base(), "Site", &ExtractLimits::default());
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[2].url.as_str(), "https://example.com/s/2");
        assert_eq!(
            candidates[2].raw_summary,
            "A longer teaser paragraph for story number 2."
        );
    }

    #[test]
    fn test_matches_without_links_are_skipped() {
        let mut html: String = (0..4).map(|i| format!("<article><p>Text {i}</p></article>")).collect();
        html.push_str(r#"<article><a href="/only">Only linked</a></article>"#);
        let candidates = extract_generic(&html, &base(), "Site", &ExtractLimits::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Only linked");
    }

    #[test]
    fn test_threshold_is_configurable() {
        let html = r#"<article><a href="/1">One</a></article><article><a href="/2">Two</a></article>"#;
        let strict = extract_generic(html, &base(), "Site", &ExtractLimits::default());
        assert!(strict.is_empty());

        let lenient = ExtractLimits {
            fallback_min_matches: 1,
            ..ExtractLimits::default()
        };
        assert_eq!(extract_generic(html, &base(), "Site", &lenient).len(), 2);
    }

    #[test]
    fn test_output_is_capped() {
        let html: String = (0..40)
            .map(|i| format!(r#"<li><a href="/n/{i}">News {i}</a></li>"#))
            .collect();
        let candidates = extract_generic(&html, &base(), "Site", &ExtractLimits::default());
        assert_eq!(candidates.len(), 10);
    }
}
