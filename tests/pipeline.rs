// tests/pipeline.rs
//
// End-to-end runs of the aggregation pipeline against an in-memory fetcher.
//
// Covered:
// - cross-source dedupe and enrichment of a category
// - enrichment failure degrading to an empty summary
// - a category whose sources all fail, next to a healthy one
// - zero-item passes never replacing a published snapshot
// - category deadline degrading instead of discarding work
// - the standalone generic scan

mod common;

use common::{StubFetcher, article, category, compile, listing, settings, source};
use std::sync::Arc;
use std::time::Duration;
use tech_news_roundup::aggregator::{Aggregator, CategoryPhase};
use tech_news_roundup::config::PipelineSettings;
use tech_news_roundup::fetcher::{FetchError, PageFetcher};
use tech_news_roundup::snapshot::{PublishOutcome, SnapshotStore};
use url::Url;

fn aggregator(fetcher: StubFetcher, settings: PipelineSettings) -> Aggregator {
    let categories = compile(vec![
        category(
            "mobile",
            vec![
                source("Site A", "https://a.example/list"),
                source("Site B", "https://b.example/list"),
            ],
        ),
        category("chip", vec![source("Site C", "https://c.example/list")]),
    ]);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(fetcher);
    Aggregator::new(fetcher, categories, settings)
}

fn healthy_fetcher() -> StubFetcher {
    StubFetcher::new()
        .page(
            "https://a.example/list",
            listing(&[("Phone X Launch", "/n/1"), ("Foldable ships", "/n/2")]),
        )
        .page(
            "https://b.example/list",
            // Same story under another URL, and the same URL as A's second item.
            listing(&[
                ("phone x launch ", "/other/1"),
                ("Foldable ships again", "https://a.example/n/2"),
                ("Tablet rumor", "/t/3"),
            ]),
        )
        .page("https://c.example/list", listing(&[("New 3nm chip", "/chip/1")]))
        .page("https://a.example/n/1", article("Phone X Launch"))
        .page("https://a.example/n/2", article("Foldable ships"))
        .page("https://b.example/t/3", article("Tablet rumor"))
        .page("https://c.example/chip/1", article("New 3nm chip"))
}

#[tokio::test]
async fn category_merges_sources_without_duplicates() {
    let agg = aggregator(healthy_fetcher(), settings());
    let outcome = agg.run_category("mobile").await;

    assert_eq!(outcome.phase, CategoryPhase::Done);
    let titles: Vec<_> = outcome.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["Phone X Launch", "Foldable ships", "Tablet rumor"]);

    let first = &outcome.items[0];
    assert_eq!(first.url, "https://a.example/n/1");
    assert_eq!(first.source, "Site A");
    assert_eq!(
        first.summary_html,
        "<p>Lead paragraph for Phone X Launch, long enough to be used.</p>"
    );
    assert_eq!(outcome.items[2].source, "Site B");
}

#[tokio::test]
async fn enrichment_timeout_keeps_item_with_empty_summary() {
    let fetcher = healthy_fetcher().fail("https://a.example/n/1", FetchError::Timeout);
    let agg = aggregator(fetcher, settings());
    let outcome = agg.run_category("mobile").await;

    assert_eq!(outcome.phase, CategoryPhase::Done);
    let item = &outcome.items[0];
    assert_eq!(item.title, "Phone X Launch");
    assert_eq!(item.url, "https://a.example/n/1");
    assert_eq!(item.source, "Site A");
    assert!(item.summary_html.is_empty());
    // The other items were still enriched.
    assert!(!outcome.items[1].summary_html.is_empty());
}

#[tokio::test]
async fn failed_category_does_not_affect_others() {
    let fetcher = healthy_fetcher()
        .fail("https://a.example/list", FetchError::Status(403))
        .fail("https://b.example/list", FetchError::Connect("reset".into()));
    let agg = aggregator(fetcher, settings());
    let snapshot = agg.run_pass().await;

    assert!(snapshot.category("mobile").is_empty());
    assert_eq!(snapshot.category("chip").len(), 1);
    assert_eq!(snapshot.total_items, 1);
    assert!(snapshot.categories.contains_key("mobile"));

    let store = SnapshotStore::new();
    assert_eq!(store.publish(snapshot), PublishOutcome::Published);
}

#[tokio::test]
async fn zero_item_pass_leaves_snapshot_unchanged() {
    let store = SnapshotStore::new();
    let good = aggregator(healthy_fetcher(), settings()).run_pass().await;
    assert_eq!(good.total_items, 4);
    store.publish(good);
    let before = store.current();

    // Every listing 404s.
    let broken = aggregator(StubFetcher::new(), settings()).run_pass().await;
    assert_eq!(broken.total_items, 0);
    assert_eq!(store.publish(broken), PublishOutcome::KeptPrevious);
    assert!(Arc::ptr_eq(&before, &store.current()));
}

#[tokio::test]
async fn category_result_is_capped() {
    let cards: Vec<(String, String)> = (0..10)
        .map(|i| (format!("Story {i}"), format!("/s/{i}")))
        .collect();
    let cards: Vec<(&str, &str)> = cards.iter().map(|(t, h)| (t.as_str(), h.as_str())).collect();
    let fetcher = StubFetcher::new()
        .page("https://a.example/list", listing(&cards))
        .page("https://b.example/list", listing(&cards));
    let capped = PipelineSettings {
        enrich_cap: 4,
        ..settings()
    };
    let outcome = aggregator(fetcher, capped).run_category("mobile").await;
    assert_eq!(outcome.items.len(), 4);
    assert_eq!(outcome.items[3].title, "Story 3");
}

#[tokio::test(start_paused = true)]
async fn stalled_listing_is_dropped_at_deadline() {
    let fetcher = healthy_fetcher().stall("https://c.example/list");
    let quick = PipelineSettings {
        category_deadline_secs: 1,
        ..settings()
    };
    let agg = aggregator(fetcher, quick);

    let outcome = agg.run_category("chip").await;
    assert_eq!(outcome.phase, CategoryPhase::Done);
    assert!(outcome.items.is_empty());

    let snapshot = agg.run_pass().await;
    assert!(snapshot.category("chip").is_empty());
    assert_eq!(snapshot.category("mobile").len(), 3);
}

fn hanging_articles() -> StubFetcher {
    healthy_fetcher()
        .stall("https://a.example/n/1")
        .stall("https://a.example/n/2")
        .stall("https://b.example/t/3")
        .stall("https://c.example/chip/1")
}

#[tokio::test(start_paused = true)]
async fn hanging_articles_still_publish_bare_items() {
    let agg = aggregator(hanging_articles(), settings());
    let t0 = tokio::time::Instant::now();
    let snapshot = agg.run_pass().await;

    assert_eq!(snapshot.total_items, 4);
    assert!(
        snapshot
            .categories
            .values()
            .flatten()
            .all(|item| item.summary_html.is_empty() && !item.title.is_empty())
    );
    assert!(t0.elapsed() < Duration::from_secs(settings().category_deadline_secs));

    let store = SnapshotStore::new();
    assert_eq!(store.publish(snapshot), PublishOutcome::Published);
}

#[tokio::test(start_paused = true)]
async fn deadline_keeps_candidates_still_being_enriched() {
    let tight = PipelineSettings {
        category_deadline_secs: 10,
        enrich_timeout_secs: 60,
        ..settings()
    };
    let agg = aggregator(hanging_articles(), tight);
    let t0 = tokio::time::Instant::now();
    let outcome = agg.run_category("mobile").await;

    assert_eq!(outcome.phase, CategoryPhase::Done);
    let titles: Vec<_> = outcome.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["Phone X Launch", "Foldable ships", "Tablet rumor"]);
    assert!(outcome.items.iter().all(|i| i.summary_html.is_empty()));
    assert_eq!(outcome.items[0].source, "Site A");
    let elapsed = t0.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11), "{elapsed:?}");
}

#[tokio::test]
async fn unknown_category_is_empty() {
    let agg = aggregator(healthy_fetcher(), settings());
    let outcome = agg.run_category("gaming").await;
    assert!(outcome.items.is_empty());
}

#[tokio::test]
async fn generic_scan_uses_fallback_selectors() {
    let list: String = (0..5)
        .map(|i| format!(r#"<h3><a href="/g/{i}">Generic headline {i}</a></h3>"#))
        .collect();
    let fetcher = StubFetcher::new().page("https://g.example/", list);
    let agg = aggregator(fetcher, settings());

    let url = Url::parse("https://g.example/").unwrap();
    let candidates = agg.generic_scan(&url, "Generic").await;
    assert_eq!(candidates.len(), 5);
    assert_eq!(candidates[0].url.as_str(), "https://g.example/g/0");
    assert_eq!(candidates[0].source, "Generic");

    let missing = Url::parse("https://missing.example/").unwrap();
    assert!(agg.generic_scan(&missing, "Missing").await.is_empty());
}
