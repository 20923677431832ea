//! HTTP surface over the published snapshot.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /health` | liveness |
//! | `GET /` | HTML page |
//! | `GET /data.json` | snapshot, always 200 |
//! | `GET /api/news` | snapshot, 503 while nothing was ever published |
//! | `GET /api/status` | timestamp, counts, whether a pass is running |
//! | `GET`/`POST /api/update` | start a pass in the background |
//!
//! Any other path gets a JSON `404`.

use crate::models::AggregateSnapshot;
use crate::outputs::html::render_page;
use crate::scheduler::Refresher;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone, Debug)]
pub struct AppState {
    pub refresher: Arc<Refresher>,
}

impl AppState {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self { refresher }
    }

    fn snapshot(&self) -> Arc<AggregateSnapshot> {
        self.refresher.store().current()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/", get(index))
        .route("/data.json", get(data_json))
        .route("/api/news", get(api_news))
        .route("/api/status", get(api_status))
        .route("/api/update", get(api_update).post(api_update))
        .fallback(not_found)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.snapshot();
    Html(render_page(&snapshot, state.refresher.aggregator().categories()))
}

async fn data_json(State(state): State<AppState>) -> Json<AggregateSnapshot> {
    Json(state.snapshot().as_ref().clone())
}

async fn api_news(State(state): State<AppState>) -> Response {
    let snapshot = state.snapshot();
    if snapshot.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "暂无新闻数据，请稍后再试" })),
        )
            .into_response();
    }
    Json(snapshot.as_ref().clone()).into_response()
}

async fn api_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.snapshot();
    let counts: BTreeMap<&str, usize> = snapshot
        .categories
        .iter()
        .map(|(id, items)| (id.as_str(), items.len()))
        .collect();
    Json(json!({
        "timestamp": snapshot.timestamp,
        "total_items": snapshot.total_items,
        "refreshing": state.refresher.is_refreshing(),
        "categories": counts,
    }))
}

async fn api_update(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let started = state.refresher.trigger();
    info!(started, "Manual refresh requested");
    (StatusCode::ACCEPTED, Json(json!({ "started": started })))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "页面不存在" })))
}
