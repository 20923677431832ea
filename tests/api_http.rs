// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/news (503 before the first publish, 200 after)
// - GET /data.json
// - GET /api/status
// - POST /api/update
// - GET /  (HTML page)
// - unknown routes (JSON 404)

mod common;

use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode},
};
use common::{StubFetcher, article, category, compile, listing, settings, source};
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;
use tech_news_roundup::aggregator::Aggregator;
use tech_news_roundup::fetcher::PageFetcher;
use tech_news_roundup::scheduler::Refresher;
use tech_news_roundup::server::{AppState, router};
use tech_news_roundup::snapshot::SnapshotStore;
use tower::ServiceExt as _; // for `oneshot`

const BODY_LIMIT: usize = 1024 * 1024;

fn test_refresher() -> Arc<Refresher> {
    let fetcher = StubFetcher::new()
        .page(
            "https://a.example/list",
            listing(&[("Phone X Launch", "/n/1"), ("Chip &lt;fast&gt; &amp; small", "/n/2")]),
        )
        .page("https://a.example/n/1", article("Phone X Launch"));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(fetcher);
    let categories = compile(vec![
        category("mobile", vec![source("Site A", "https://a.example/list")]),
        category("chip", vec![source("Site C", "https://c.example/list")]),
    ]);
    let aggregator = Arc::new(Aggregator::new(fetcher, categories, settings()));
    Arc::new(Refresher::new(aggregator, Arc::new(SnapshotStore::new()), None))
}

fn test_router(refresher: &Arc<Refresher>) -> Router {
    router(AppState::new(Arc::clone(refresher)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let (status, bytes) = get(app, uri).await;
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let refresher = test_refresher();
    let (status, bytes) = get(test_router(&refresher), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).expect("utf8"), "ok");
}

#[tokio::test]
async fn api_news_is_503_until_first_publish() {
    let refresher = test_refresher();

    let (status, v) = get_json(test_router(&refresher), "/api/news").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(v.get("error").is_some(), "missing 'error'");

    refresher.refresh().await.expect("no pass running");

    let (status, v) = get_json(test_router(&refresher), "/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_items"], 2);
    assert_eq!(v["categories"]["mobile"][0]["title"], "Phone X Launch");
    assert_eq!(v["categories"]["mobile"][0]["source"], "Site A");
    assert_eq!(v["categories"]["chip"].as_array().map(Vec::len), Some(0));
    assert!(v["timestamp"].is_string());
}

#[tokio::test]
async fn data_json_is_always_200() {
    let refresher = test_refresher();
    let (status, v) = get_json(test_router(&refresher), "/data.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_items"], 0);
    assert!(v["timestamp"].is_null());
}

#[tokio::test]
async fn api_status_reports_counts() {
    let refresher = test_refresher();
    refresher.refresh().await.expect("no pass running");

    let (status, v) = get_json(test_router(&refresher), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_items"], 2);
    assert_eq!(v["refreshing"], false);
    assert_eq!(v["categories"]["mobile"], 2);
    assert_eq!(v["categories"]["chip"], 0);
}

#[tokio::test]
async fn api_update_starts_a_background_pass() {
    let refresher = test_refresher();

    let req = Request::builder()
        .method("POST")
        .uri("/api/update")
        .body(Body::empty())
        .expect("build POST /api/update");
    let resp = test_router(&refresher).oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(v["started"], true);

    // Wait for the spawned pass to publish.
    for _ in 0..200 {
        if !refresher.store().current().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(refresher.store().current().total_items, 2);
}

#[tokio::test]
async fn index_renders_escaped_headlines() {
    let refresher = test_refresher();
    refresher.refresh().await.expect("no pass running");

    let (status, bytes) = get(test_router(&refresher), "/").await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(bytes).expect("utf8");
    assert!(page.contains("Phone X Launch"));
    assert!(page.contains("Chip &lt;fast&gt; &amp; small"));
    assert!(!page.contains("<fast>"));
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let refresher = test_refresher();
    let (status, v) = get_json(test_router(&refresher), "/no/such/page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"], "页面不存在");
}
