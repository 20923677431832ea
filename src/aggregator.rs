//! Category and pass orchestration.
//!
//! A category run walks through [`CategoryPhase`]s:
//!
//! ```text
//! Idle -> Fetching -> Extracting -> Merging -> Enriching -> Done
//!                                                       \-> Failed
//! ```
//!
//! Sources are fetched concurrently and each one is isolated: a failed fetch or
//! a page nothing can be extracted from just contributes zero candidates.
//! Enrichment is isolated per candidate in the same way. The category
//! deadline only degrades a run: late sources contribute nothing and late
//! enrichments leave their items without a summary. A category ends up
//! `Failed` only when something panics, and then it contributes an empty list.

use crate::config::{CompiledCategory, CompiledSource, PipelineSettings};
use crate::fetcher::PageFetcher;
use crate::models::{AggregateSnapshot, Candidate, CategoryResult, NewsItem};
use crate::scrapers::dedupe::{dedupe_by_title, dedupe_by_url};
use crate::scrapers::enrich::Enricher;
use crate::scrapers::extract::{ExtractLimits, extract};
use crate::scrapers::fallback::extract_generic;
use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Lifecycle of one category run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryPhase {
    Idle,
    Fetching,
    Extracting,
    Merging,
    Enriching,
    Done,
    Failed,
}

impl fmt::Display for CategoryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CategoryPhase::Idle => "idle",
            CategoryPhase::Fetching => "fetching",
            CategoryPhase::Extracting => "extracting",
            CategoryPhase::Merging => "merging",
            CategoryPhase::Enriching => "enriching",
            CategoryPhase::Done => "done",
            CategoryPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final state and items of a category run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub phase: CategoryPhase,
    pub items: CategoryResult,
}

struct PhaseTracker<'a> {
    category: &'a str,
    phase: CategoryPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(category: &'a str) -> Self {
        Self {
            category,
            phase: CategoryPhase::Idle,
        }
    }

    fn advance(&mut self, next: CategoryPhase) {
        debug!(category = self.category, from = %self.phase, to = %next, "Category phase");
        self.phase = next;
    }
}

/// Runs the scraping pipeline over the configured categories.
pub struct Aggregator {
    fetcher: Arc<dyn PageFetcher>,
    categories: Vec<CompiledCategory>,
    settings: Arc<PipelineSettings>,
    limits: ExtractLimits,
    enricher: Enricher,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("categories", &self.categories.len())
            .field("limits", &self.limits)
            .finish()
    }
}

impl Aggregator {
    /// Create an aggregator over compiled categories.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Used for listing pages and article pages alike
    /// * `categories` - Output of [`crate::config::AppConfig::compile`]
    /// * `settings` - Caps, thresholds, concurrency and deadlines
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        categories: Vec<CompiledCategory>,
        settings: PipelineSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        let limits = ExtractLimits::from(settings.as_ref());
        let enricher = Enricher::new(Arc::clone(&fetcher), Arc::clone(&settings));
        Self {
            fetcher,
            categories,
            settings,
            limits,
            enricher,
        }
    }

    pub fn categories(&self) -> &[CompiledCategory] {
        &self.categories
    }

    /// Run every category concurrently and assemble a snapshot once all are finished.
    ///
    /// # Returns
    ///
    /// A snapshot holding every configured category, empty ones included.
    /// It is stamped with the finish time and may have zero items in total.
    /// Deciding whether to publish it is up to [`crate::snapshot::SnapshotStore`].
    #[instrument(level = "info", skip_all)]
    pub async fn run_pass(&self) -> AggregateSnapshot {
        let t0 = Instant::now();
        let outcomes = join_all(self.categories.iter().map(|c| self.run_isolated(c))).await;

        let mut categories = BTreeMap::new();
        for (category, outcome) in self.categories.iter().zip(outcomes) {
            categories.insert(category.id.clone(), outcome.items);
        }
        let snapshot = AggregateSnapshot::new(categories, Utc::now());

        info!(
            total_items = snapshot.total_items,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Refresh pass complete"
        );
        snapshot
    }

    /// Run a single configured category by id.
    ///
    /// Unknown ids produce an empty result.
    pub async fn run_category(&self, id: &str) -> CategoryOutcome {
        match self.categories.iter().find(|c| c.id == id) {
            Some(category) => self.run_isolated(category).await,
            None => {
                warn!(category = id, "Unknown category");
                CategoryOutcome {
                    phase: CategoryPhase::Failed,
                    items: Vec::new(),
                }
            }
        }
    }

    /// Category run bounded by the deadline and shielded from panics.
    ///
    /// The deadline never discards work: sources still outstanding when it
    /// expires count as failed, and candidates still being enriched are kept
    /// as bare items. Only a panic ends a run as [`CategoryPhase::Failed`].
    async fn run_isolated(&self, category: &CompiledCategory) -> CategoryOutcome {
        let deadline =
            Instant::now() + Duration::from_secs(self.settings.category_deadline_secs);
        let guarded = AssertUnwindSafe(self.run_compiled(category, deadline)).catch_unwind();

        match guarded.await {
            Ok(items) => {
                info!(category = %category.id, count = items.len(), "Category done");
                CategoryOutcome {
                    phase: CategoryPhase::Done,
                    items,
                }
            }
            Err(_panic) => {
                error!(category = %category.id, "Category run panicked; publishing it empty");
                CategoryOutcome {
                    phase: CategoryPhase::Failed,
                    items: Vec::new(),
                }
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(category = %category.id))]
    async fn run_compiled(&self, category: &CompiledCategory, deadline: Instant) -> CategoryResult {
        let mut tracker = PhaseTracker::new(&category.id);

        tracker.advance(CategoryPhase::Fetching);
        let fetches: Vec<BoxFuture<'_, (&CompiledSource, Option<String>)>> = category
            .sources
            .iter()
            .map(|source| self.fetch_source(source, deadline).boxed())
            .collect();
        let pages: Vec<(&CompiledSource, Option<String>)> = stream::iter(fetches)
            .buffered(self.settings.source_concurrency)
            .collect()
            .await;

        tracker.advance(CategoryPhase::Extracting);
        let mut candidates = Vec::new();
        for (source, markup) in pages {
            let Some(markup) = markup else { continue };
            let found = extract(&markup, source, &self.limits);
            if found.is_empty() {
                warn!(source = %source.name, "No candidates from configured or generic selectors");
            } else {
                info!(source = %source.name, count = found.len(), "Extracted candidates");
            }
            candidates.extend(found);
        }

        tracker.advance(CategoryPhase::Merging);
        let selected = merge_candidates(candidates, self.settings.result_cap());

        tracker.advance(CategoryPhase::Enriching);
        let enrichments: Vec<BoxFuture<'_, NewsItem>> = selected
            .into_iter()
            .map(|candidate| self.enrich_before(candidate, deadline).boxed())
            .collect();
        let items: CategoryResult = stream::iter(enrichments)
            .buffered(self.settings.enrich_concurrency)
            .collect()
            .await;

        tracker.advance(CategoryPhase::Done);
        items
    }

    /// Fetch one listing page; a failure or an expired deadline yields `None`.
    async fn fetch_source<'s>(
        &self,
        source: &'s CompiledSource,
        deadline: Instant,
    ) -> (&'s CompiledSource, Option<String>) {
        match timeout_at(deadline, self.fetcher.fetch(&source.url)).await {
            Ok(Ok(markup)) => (source, Some(markup)),
            Ok(Err(e)) => {
                warn!(source = %source.name, url = %source.url, error = %e, "Source fetch failed");
                (source, None)
            }
            Err(_elapsed) => {
                warn!(source = %source.name, url = %source.url, "Category deadline hit while fetching source");
                (source, None)
            }
        }
    }

    /// Enrich a candidate, or keep it bare once the category deadline has passed.
    async fn enrich_before(&self, candidate: Candidate, deadline: Instant) -> NewsItem {
        let bare = NewsItem::bare(&candidate, self.enricher.attribute(&candidate));
        match timeout_at(deadline, self.enricher.enrich(candidate)).await {
            Ok(item) => item,
            Err(_elapsed) => {
                warn!(url = %bare.url, "Category deadline hit; keeping item without summary");
                bare
            }
        }
    }

    /// Fetch an unconfigured page and scan it with the generic selectors only.
    #[instrument(level = "info", skip(self))]
    pub async fn generic_scan(&self, url: &Url, site_name: &str) -> Vec<Candidate> {
        match self.fetcher.fetch(url).await {
            Ok(markup) => extract_generic(&markup, url, site_name, &self.limits),
            Err(e) => {
                warn!(error = %e, "Generic scan fetch failed");
                Vec::new()
            }
        }
    }
}

/// Flattened candidates of a category, deduplicated and cut to `cap`.
pub fn merge_candidates(candidates: Vec<Candidate>, cap: usize) -> Vec<Candidate> {
    let mut merged = dedupe_by_title(dedupe_by_url(candidates));
    merged.truncate(cap);
    merged
}
