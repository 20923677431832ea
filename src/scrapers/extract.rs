//! Candidate extraction from a listing page using a source's selector rules.
//!
//! The rules of a [`CompiledSource`] are tried in order and the first one
//! producing at least one candidate wins. When none does, the page is handed
//! to the generic [`FallbackChain`].

use super::fallback::FallbackChain;
use super::links::resolve;
use super::{ANCHOR, BLOCK, element_text, headline_text, is_anchor};
use crate::config::{CompiledRule, CompiledSource, PipelineSettings};
use crate::models::Candidate;
use crate::utils::truncate_chars;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument};
use url::Url;

/// Bounds applied while extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub per_source_limit: usize,
    pub fallback_min_matches: usize,
    pub min_summary_chars: usize,
    pub summary_max_chars: usize,
}

impl From<&PipelineSettings> for ExtractLimits {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            per_source_limit: settings.per_source_limit,
            fallback_min_matches: settings.fallback_min_matches,
            min_summary_chars: settings.min_summary_chars,
            summary_max_chars: settings.summary_max_chars,
        }
    }
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

/// Extract up to `per_source_limit` candidates from a listing page.
///
/// The source's rules are tried in order; the first one that yields at least
/// one candidate wins. When none does, the generic [`FallbackChain`] runs.
///
/// # Arguments
///
/// * `markup` - Decoded HTML of the listing page
/// * `source` - The compiled source (name, page URL, selector rules)
/// * `limits` - Caps and thresholds from [`PipelineSettings`]
///
/// # Returns
///
/// Candidates in document order. Never fails: a page that matches nothing
/// yields an empty list.
#[instrument(level = "debug", skip_all, fields(source = %source.name))]
pub fn extract(markup: &str, source: &CompiledSource, limits: &ExtractLimits) -> Vec<Candidate> {
    let document = Html::parse_document(markup);

    for (index, rule) in source.rules.iter().enumerate() {
        let candidates = apply_rule(&document, rule, &source.url, &source.name, limits);
        if !candidates.is_empty() {
            debug!(rule = index, count = candidates.len(), "Configured rule matched");
            return candidates;
        }
    }

    debug!("Configured rules found nothing; trying generic selectors");
    FallbackChain::generic().extract(&document, &source.url, &source.name, limits)
}

/// Run one rule over the first `per_source_limit` item elements.
///
/// Items without a usable title are skipped one by one; the rest of the page
/// is still processed.
///
/// # Arguments
///
/// * `document` - The parsed listing page
/// * `rule` - Item, title and summary selectors plus the link attribute
/// * `base` - URL the page was fetched from, used to resolve links
/// * `source_name` - Written into every candidate's `source`
/// * `limits` - Caps and teaser length
///
/// # Returns
///
/// The candidates this rule produced, possibly none.
pub fn apply_rule(
    document: &Html,
    rule: &CompiledRule,
    base: &Url,
    source_name: &str,
    limits: &ExtractLimits,
) -> Vec<Candidate> {
    document
        .select(&rule.item)
        .take(limits.per_source_limit)
        .filter_map(|item| {
            let candidate = candidate_from_item(item, rule, base, source_name, limits);
            if candidate.is_none() {
                debug!(html = %crate::utils::truncate_for_log(&item.html(), 120), "Skipping item");
            }
            candidate
        })
        .collect()
}

fn candidate_from_item(
    item: ElementRef<'_>,
    rule: &CompiledRule,
    base: &Url,
    source_name: &str,
    limits: &ExtractLimits,
) -> Option<Candidate> {
    let title_el = match &rule.title {
        Some(selector) => item.select(selector).next()?,
        None => item,
    };
    let title = headline_text(title_el);
    if title.is_empty() {
        return None;
    }

    let link_el = if is_anchor(title_el) {
        Some(title_el)
    } else {
        title_el
            .select(&ANCHOR)
            .next()
            .or_else(|| item.select(&ANCHOR).next())
    };
    let href = link_el
        .and_then(|a| a.value().attr(&rule.link_attr))
        .unwrap_or_default();
    let url = resolve(href, base);

    Some(Candidate {
        title,
        url,
        raw_summary: listing_summary(item, rule, limits),
        source: source_name.to_string(),
    })
}

/// The rule's summary element, else the first block descendant's text cut short.
fn listing_summary(item: ElementRef<'_>, rule: &CompiledRule, limits: &ExtractLimits) -> String {
    let configured = rule
        .summary
        .as_ref()
        .and_then(|selector| item.select(selector).next())
        .map(element_text)
        .filter(|text| !text.is_empty());
    if let Some(summary) = configured {
        return summary;
    }

    item.select(&BLOCK)
        .map(element_text)
        .find(|text| !text.is_empty())
        .map(|text| truncate_chars(&text, limits.summary_max_chars))
        .unwrap_or_default()
}
