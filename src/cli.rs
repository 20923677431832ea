//! Command-line interface definitions.
//!
//! All arguments can be provided via command-line flags or environment variables.

use clap::Parser;
use std::path::PathBuf;

/// Scrape tech news per category and serve an hourly snapshot.
///
/// # Examples
///
/// ```sh
/// # Serve on the default address with the built-in sources
/// tech_news_roundup
///
/// # Custom sources file and a 30 minute refresh
/// tech_news_roundup --config sources.yaml --refresh-secs 1800
///
/// # One pass for a single category, printed to stdout
/// tech_news_roundup --once --category chip
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Address the HTTP server listens on
    #[arg(short, long, env = "NEWS_BIND", default_value = "0.0.0.0:8000")]
    pub bind: String,

    /// Optional YAML file overriding sources and pipeline settings
    #[arg(short, long, env = "NEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Where the last published snapshot is persisted
    #[arg(short, long, env = "NEWS_DATA_FILE", default_value = "data/news_data.json")]
    pub data_file: PathBuf,

    /// Seconds between scheduled refresh passes
    #[arg(long, env = "NEWS_REFRESH_SECS", default_value_t = 3600)]
    pub refresh_secs: u64,

    /// Run a single pass, print the result as JSON and exit
    #[arg(long)]
    pub once: bool,

    /// Restrict `--once` to one category id
    #[arg(long, requires = "once")]
    pub category: Option<String>,
}
