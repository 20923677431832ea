//! # Tech News Roundup
//!
//! Scrapes news listings from a fixed table of Chinese tech sites, grouped by
//! category (phones, smart home, automotive, operating systems, chips),
//! enriches every headline with a lead paragraph from its article, and serves
//! the result over HTTP. The snapshot is refreshed hourly.
//!
//! ## Usage
//!
//! ```sh
//! tech_news_roundup --bind 0.0.0.0:8000 --data-file ./data/news_data.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: Download each source's listing page
//! 2. **Extracting**: Locate candidates with site rules, else generic selectors
//! 3. **Merging**: Deduplicate across sources and cap the batch
//! 4. **Enriching**: Fetch each article for a summary (parallel)
//! 5. **Publishing**: Swap in the new snapshot, persist it, serve it

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tech_news_roundup::aggregator::Aggregator;
use tech_news_roundup::cli::Cli;
use tech_news_roundup::config::AppConfig;
use tech_news_roundup::fetcher::build_fetcher;
use tech_news_roundup::outputs::json::{read_snapshot, write_snapshot};
use tech_news_roundup::scheduler::{Refresher, spawn_scheduler};
use tech_news_roundup::server::{AppState, router};
use tech_news_roundup::snapshot::SnapshotStore;
use tech_news_roundup::utils::ensure_parent_writable;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tech_news_roundup starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Config ----
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let categories = config.compile()?;
    info!(
        categories = categories.len(),
        sources = categories.iter().map(|c| c.sources.len()).sum::<usize>(),
        "Compiled source table"
    );

    let fetcher = build_fetcher(&config.fetch)?;
    let aggregator = Arc::new(Aggregator::new(fetcher, categories, config.pipeline.clone()));

    // ---- One-shot mode ----
    if args.once {
        let json = match &args.category {
            Some(id) => serde_json::to_string_pretty(&aggregator.run_category(id).await.items)?,
            None => {
                let snapshot = aggregator.run_pass().await;
                if snapshot.is_empty() {
                    warn!("Pass produced no items; not writing snapshot file");
                } else if let Err(e) = write_snapshot(&snapshot, &args.data_file).await {
                    error!(path = %args.data_file.display(), error = %e, "Failed to write snapshot");
                }
                serde_json::to_string_pretty(&snapshot)?
            }
        };
        println!("{json}");
        info!(elapsed = ?start_time.elapsed(), "One-shot run complete");
        return Ok(());
    }

    // Early check: a data file we can't write would only show up an hour from now.
    if let Err(e) = ensure_parent_writable(&args.data_file).await {
        error!(
            path = %args.data_file.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    // ---- Snapshot store, seeded from the last run ----
    let store = Arc::new(SnapshotStore::new());
    if let Some(previous) = read_snapshot(&args.data_file).await {
        store.publish(previous);
    }

    let refresher = Arc::new(Refresher::new(
        aggregator,
        Arc::clone(&store),
        Some(args.data_file.clone()),
    ));
    let _scheduler = spawn_scheduler(
        Arc::clone(&refresher),
        Duration::from_secs(args.refresh_secs.max(1)),
    );

    // ---- HTTP ----
    let app = router(AppState::new(refresher));
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(bind = %args.bind, "Serving");
    axum::serve(listener, app).await?;

    Ok(())
}
