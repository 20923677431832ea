//! Library surface of the news roundup: the scraping pipeline, the published
//! snapshot, and the thin HTTP/scheduling layers around them.
//!
//! The binary in `main.rs` wires these together; integration tests drive them
//! directly with an in-memory [`fetcher::PageFetcher`].

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod models;
pub mod outputs;
pub mod retry;
pub mod scheduler;
pub mod scrapers;
pub mod server;
pub mod snapshot;
pub mod utils;

pub use aggregator::Aggregator;
pub use models::{AggregateSnapshot, Candidate, CategoryResult, NewsItem};
pub use snapshot::{PublishOutcome, SnapshotStore};
