//! Summary enrichment from a candidate's own article page.
//!
//! Enrichment never fails: a candidate whose article cannot be fetched or
//! yields nothing usable still becomes a [`NewsItem`], just with an empty
//! summary.

use super::links::resolve;
use super::element_text;
use crate::config::{Attribution, PipelineSettings};
use crate::fetcher::PageFetcher;
use crate::models::{Candidate, NewsItem};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use url::Url;

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("valid selector"));
static VIDEO: Lazy<Selector> =
    Lazy::new(|| Selector::parse("video[src], video source[src]").expect("valid selector"));

/// Where publication times hide, as `(selector, attribute)` pairs in priority order.
static PUBLISHED: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    [
        (r#"meta[property="article:published_time"]"#, "content"),
        (r#"meta[name="pubdate"]"#, "content"),
        (r#"meta[name="publishdate"]"#, "content"),
        (r#"meta[itemprop="datePublished"]"#, "content"),
        ("time[datetime]", "datetime"),
    ]
    .into_iter()
    .map(|(s, attr)| (Selector::parse(s).expect("valid selector"), attr))
    .collect()
});

/// What an article page contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleSummary {
    pub summary_html: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Pull a summary fragment and publication time out of article markup.
///
/// Preference order: first paragraph with at least `min_chars` characters,
/// then the first iframe, then the first video. Media sources are resolved
/// against `page_url`.
pub fn summarize_article(markup: &str, page_url: &Url, min_chars: usize) -> ArticleSummary {
    let document = Html::parse_document(markup);
    ArticleSummary {
        summary_html: summary_fragment(&document, page_url, min_chars),
        published_at: published_at(&document),
    }
}

fn summary_fragment(document: &Html, page_url: &Url, min_chars: usize) -> String {
    let paragraph = document
        .select(&PARAGRAPH)
        .map(element_text)
        .find(|text| text.chars().count() >= min_chars);
    if let Some(text) = paragraph {
        return paragraph_fragment(&text);
    }

    if let Some(src) = first_src(document, &IFRAME) {
        let src = resolve(src, page_url);
        return format!(
            r#"<iframe src="{}" allow="autoplay; encrypted-media" allowfullscreen loading="lazy"></iframe>"#,
            encode_double_quoted_attribute(src.as_str())
        );
    }

    if let Some(src) = first_src(document, &VIDEO) {
        let src = resolve(src, page_url);
        return format!(
            r#"<video src="{}" controls></video>"#,
            encode_double_quoted_attribute(src.as_str())
        );
    }

    String::new()
}

fn first_src<'a>(document: &'a Html, selector: &Selector) -> Option<&'a str> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
}

/// Wrap plain text as a single escaped paragraph.
pub fn paragraph_fragment(text: &str) -> String {
    format!("<p>{}</p>", encode_text(text))
}

fn published_at(document: &Html) -> Option<DateTime<Utc>> {
    PUBLISHED.iter().find_map(|(selector, attr)| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .find_map(parse_published)
    })
}

/// Parse the timestamp formats seen on news pages. Naive times are taken as UTC.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Turns candidates into news items by visiting their article pages.
#[derive(Clone)]
pub struct Enricher {
    fetcher: Arc<dyn PageFetcher>,
    settings: Arc<PipelineSettings>,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("attribution", &self.settings.attribution)
            .finish()
    }
}

impl Enricher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: Arc<PipelineSettings>) -> Self {
        Self { fetcher, settings }
    }

    /// Source name for an item according to the configured attribution authority.
    pub fn attribute(&self, candidate: &Candidate) -> String {
        match self.settings.attribution {
            Attribution::Listing => candidate.source.clone(),
            Attribution::Host => self.settings.source_from_url(candidate.url.as_str()),
        }
    }

    /// Turn a candidate into a news item using its article page.
    ///
    /// The article fetch is bounded by `enrich_timeout_secs`. A failed or
    /// late fetch, or a page with nothing usable, leaves `summary_html`
    /// empty (or the listing teaser when `listing_summary_fallback` is on).
    ///
    /// # Arguments
    ///
    /// * `candidate` - Listing-stage headline with its resolved URL
    ///
    /// # Returns
    ///
    /// Always a [`NewsItem`]; title, URL and source come from the candidate.
    #[instrument(level = "debug", skip_all, fields(url = %candidate.url))]
    pub async fn enrich(&self, candidate: Candidate) -> NewsItem {
        let mut item = NewsItem::bare(&candidate, self.attribute(&candidate));

        let budget = Duration::from_secs(self.settings.enrich_timeout_secs);
        match timeout(budget, self.fetcher.fetch(&candidate.url)).await {
            Ok(Ok(markup)) => {
                let article =
                    summarize_article(&markup, &candidate.url, self.settings.min_summary_chars);
                if article.summary_html.is_empty() {
                    debug!("Article has no usable paragraph or media");
                }
                item.summary_html = article.summary_html;
                item.published_at = article.published_at;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Article fetch failed; keeping item without summary");
            }
            Err(_elapsed) => {
                warn!(?budget, "Article fetch timed out; keeping item without summary");
            }
        }

        if item.summary_html.is_empty()
            && self.settings.listing_summary_fallback
            && !candidate.raw_summary.is_empty()
        {
            item.summary_html = paragraph_fragment(&candidate.raw_summary);
        }
        item
    }
}
