//! Source table and pipeline settings.
//!
//! The scraping targets are plain data: every category owns an ordered list of
//! sources, and every source owns an ordered list of [`SelectorRule`]s that the
//! one generic extractor in [`crate::scrapers::extract`] consumes. Nothing here
//! is per-site code.
//!
//! A YAML file may override any part of [`AppConfig`]; missing sections fall
//! back to the built-in defaults:
//!
//! ```yaml
//! pipeline:
//!   enrich_cap: 8
//! categories:
//!   - id: mobile
//!     label: 手机
//!     icon: 📱
//!     sources:
//!       - name: IT之家
//!         url: https://mobile.ithome.com/
//!         rules:
//!           - { item: ".lst li", title: a, summary: .c }
//! ```
//!
//! Selectors are compiled once by [`AppConfig::compile`]; an invalid selector
//! or URL is a start-up error.

use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid selector `{selector}` in source {source_name}: {message}")]
    Selector {
        source_name: String,
        selector: String,
        message: String,
    },
    #[error("invalid url `{url}` in source {source_name}: {message}")]
    Url {
        source_name: String,
        url: String,
        message: String,
    },
    #[error("invalid setting {0}")]
    Setting(String),
}

/// One way of locating items on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SelectorRule {
    /// Selector enumerating item elements.
    pub item: String,
    /// Selector for the headline inside an item; the item itself when absent.
    #[serde(default)]
    pub title: Option<String>,
    /// Selector for the teaser inside an item.
    #[serde(default)]
    pub summary: Option<String>,
    /// Attribute holding the link on the anchor.
    #[serde(default = "default_link_attr")]
    pub link_attr: String,
}

fn default_link_attr() -> String {
    "href".to_string()
}

/// A listing page and the rules that find items on it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Display name, used as the items' source under listing attribution.
    pub name: String,
    pub url: String,
    /// Tried in order; empty means generic selectors only.
    #[serde(default)]
    pub rules: Vec<SelectorRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryConfig {
    /// Stable identifier used as the snapshot key, e.g. `mobile`.
    pub id: String,
    /// Human readable name shown on the page.
    pub label: String,
    #[serde(default)]
    pub icon: String,
    pub sources: Vec<SourceConfig>,
}

/// Outbound HTTP behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    /// Total attempts for transient failures, including the first one.
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Randomized politeness delay before each request. Both zero disables it.
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub max_in_flight: usize,
    /// Encoding used when a page declares nothing and is not valid UTF-8.
    pub fallback_encoding: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            delay_min_ms: 1_000,
            delay_max_ms: 3_000,
            max_in_flight: 8,
            fallback_encoding: "gb18030".to_string(),
        }
    }
}

/// Who names the source of an enriched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    /// The `name` of the source whose listing produced the candidate.
    #[default]
    Listing,
    /// Pattern match of the article host against [`PipelineSettings::host_aliases`].
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostAlias {
    /// Substring looked for in the article URL.
    pub pattern: String,
    pub name: String,
}

/// Heuristic constants of the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Max candidates taken from one listing page.
    pub per_source_limit: usize,
    /// A generic selector is adopted only with more matches than this.
    pub fallback_min_matches: usize,
    /// Max candidates per category that get enriched.
    pub enrich_cap: usize,
    /// Hard cap on a published category.
    pub category_cap: usize,
    /// Minimum characters for a paragraph to count as a summary.
    pub min_summary_chars: usize,
    /// Listing teasers are cut to this many characters.
    pub summary_max_chars: usize,
    pub source_concurrency: usize,
    pub enrich_concurrency: usize,
    /// Budget for one article fetch during enrichment, retries included.
    pub enrich_timeout_secs: u64,
    pub category_deadline_secs: u64,
    /// Use the listing teaser when the article yields no summary.
    pub listing_summary_fallback: bool,
    pub attribution: Attribution,
    pub host_aliases: Vec<HostAlias>,
    pub default_source_name: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            per_source_limit: 10,
            fallback_min_matches: 3,
            enrich_cap: 12,
            category_cap: 20,
            min_summary_chars: 20,
            summary_max_chars: 200,
            source_concurrency: 4,
            enrich_concurrency: 6,
            enrich_timeout_secs: 30,
            category_deadline_secs: 300,
            listing_summary_fallback: false,
            attribution: Attribution::Listing,
            host_aliases: default_host_aliases(),
            default_source_name: "来源网站".to_string(),
        }
    }
}

impl PipelineSettings {
    /// The effective upper bound on a category's length.
    pub fn result_cap(&self) -> usize {
        self.enrich_cap.min(self.category_cap)
    }

    /// Name a source from an article URL using the host alias table.
    pub fn source_from_url(&self, url: &str) -> String {
        self.host_aliases
            .iter()
            .find(|alias| url.contains(&alias.pattern))
            .map(|alias| alias.name.clone())
            .unwrap_or_else(|| self.default_source_name.clone())
    }
}

fn default_host_aliases() -> Vec<HostAlias> {
    [
        ("ithome.com", "IT之家"),
        ("sina.com.cn", "新浪科技"),
        ("smartcn.cn", "新浪科技"),
        ("36kr.com", "36氪"),
        ("news.cn", "新华网"),
    ]
    .into_iter()
    .map(|(pattern, name)| HostAlias {
        pattern: pattern.to_string(),
        name: name.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchSettings,
    pub pipeline: PipelineSettings,
    pub categories: Vec<CategoryConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            pipeline: PipelineSettings::default(),
            categories: default_categories(),
        }
    }
}

impl AppConfig {
    /// Load a YAML config file.
    ///
    /// # Arguments
    ///
    /// * `path` - File with any subset of `fetch`, `pipeline`, `categories`
    ///
    /// # Returns
    ///
    /// The config with omitted sections filled from the defaults, or a
    /// [`ConfigError`] for unreadable files and invalid YAML.
    #[instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        info!(
            categories = config.categories.len(),
            path = %path.display(),
            "Loaded sources config"
        );
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Validate settings and compile every selector and URL.
    ///
    /// # Returns
    ///
    /// Categories in configured order, ready for the aggregator, or the first
    /// [`ConfigError::Setting`], [`ConfigError::Selector`] or
    /// [`ConfigError::Url`] found.
    pub fn compile(&self) -> Result<Vec<CompiledCategory>, ConfigError> {
        if self.pipeline.per_source_limit == 0 {
            return Err(ConfigError::Setting("pipeline.per_source_limit must be > 0".into()));
        }
        if self.pipeline.source_concurrency == 0 || self.pipeline.enrich_concurrency == 0 {
            return Err(ConfigError::Setting("pipeline concurrency must be > 0".into()));
        }
        if self.pipeline.enrich_timeout_secs == 0 {
            return Err(ConfigError::Setting("pipeline.enrich_timeout_secs must be > 0".into()));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Setting("fetch.max_attempts must be > 0".into()));
        }
        if self.fetch.delay_min_ms > self.fetch.delay_max_ms {
            return Err(ConfigError::Setting(
                "fetch.delay_min_ms must not exceed fetch.delay_max_ms".into(),
            ));
        }
        self.categories.iter().map(CompiledCategory::compile).collect()
    }
}

/// A selector rule ready to run against a parsed document.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub item: Selector,
    pub title: Option<Selector>,
    pub summary: Option<Selector>,
    pub link_attr: String,
}

#[derive(Debug, Clone)]
pub struct CompiledSource {
    pub name: String,
    pub url: Url,
    pub rules: Vec<CompiledRule>,
}

#[derive(Debug, Clone)]
pub struct CompiledCategory {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub sources: Vec<CompiledSource>,
}

impl CompiledCategory {
    fn compile(category: &CategoryConfig) -> Result<Self, ConfigError> {
        let sources = category
            .sources
            .iter()
            .map(CompiledSource::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: category.id.clone(),
            label: category.label.clone(),
            icon: category.icon.clone(),
            sources,
        })
    }
}

impl CompiledSource {
    pub fn compile(source: &SourceConfig) -> Result<Self, ConfigError> {
        let url = Url::parse(&source.url).map_err(|e| ConfigError::Url {
            source_name: source.name.clone(),
            url: source.url.clone(),
            message: e.to_string(),
        })?;
        let parse = |selector: &str| {
            Selector::parse(selector).map_err(|e| ConfigError::Selector {
                source_name: source.name.clone(),
                selector: selector.to_string(),
                message: e.to_string(),
            })
        };
        let rules = source
            .rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    item: parse(&rule.item)?,
                    title: rule.title.as_deref().map(parse).transpose()?,
                    summary: rule.summary.as_deref().map(parse).transpose()?,
                    link_attr: rule.link_attr.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            name: source.name.clone(),
            url,
            rules,
        })
    }
}

fn rule(item: &str, title: Option<&str>, summary: Option<&str>) -> SelectorRule {
    SelectorRule {
        item: item.to_string(),
        title: title.map(str::to_string),
        summary: summary.map(str::to_string),
        link_attr: default_link_attr(),
    }
}

fn source(name: &str, url: &str, rules: Vec<SelectorRule>) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        rules,
    }
}

/// Card-style rules followed by the anchor rules that work on most portals.
fn card_rules(item: &str, title: &str, summary: &str) -> Vec<SelectorRule> {
    vec![
        rule(item, Some(title), Some(summary)),
        rule("a[href][title]", None, None),
        rule("h2 a", None, None),
        rule("h3 a", None, None),
    ]
}

fn kr_rules(item: &str) -> Vec<SelectorRule> {
    vec![
        rule(item, Some(".title"), Some(".summary")),
        rule("a.article-item-title", None, None),
        rule("a[href*='/p/']", None, None),
    ]
}

/// The built-in source table.
pub fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            id: "mobile".to_string(),
            label: "手机".to_string(),
            icon: "📱".to_string(),
            sources: vec![
                source("IT之家", "https://mobile.ithome.com/", card_rules(".lst li", "a", ".c")),
                source(
                    "新浪科技",
                    "https://mobile.sina.com.cn/",
                    card_rules(".feed-card", ".feed-card-title", ".feed-card-summary"),
                ),
                source(
                    "36氪",
                    "https://www.36kr.com/search/articles/%E6%89%8B%E6%9C%BA",
                    kr_rules(".search-result-item"),
                ),
            ],
        },
        CategoryConfig {
            id: "smart_home".to_string(),
            label: "智能家电".to_string(),
            icon: "🏠".to_string(),
            sources: vec![
                source(
                    "新浪科技",
                    "https://www.smartcn.cn/news",
                    vec![
                        rule(".news-item", Some(".title"), Some(".summary")),
                        rule(".news_list a", None, None),
                        rule("h2 a", None, None),
                        rule("h3 a", None, None),
                    ],
                ),
                source(
                    "36氪",
                    "https://www.36kr.com/search/articles/%E6%99%BA%E8%83%BD%E5%AE%B6%E7%94%B5",
                    kr_rules(".search-result-item"),
                ),
            ],
        },
        CategoryConfig {
            id: "automotive".to_string(),
            label: "汽车".to_string(),
            icon: "🚗".to_string(),
            sources: vec![
                source(
                    "新华网",
                    "https://www.news.cn/auto/index.html",
                    card_rules(".news-item", ".title", ".summary"),
                ),
                source(
                    "36氪",
                    "https://www.36kr.com/information/travel/",
                    kr_rules(".article-item"),
                ),
            ],
        },
        CategoryConfig {
            id: "os".to_string(),
            label: "操作系统".to_string(),
            icon: "💻".to_string(),
            sources: vec![
                source(
                    "新浪科技",
                    "https://search.sina.com.cn/?ac=product&from=tech_index&source=tech&range=title&f_name=&col=&c=news&ie=utf-8&c=news&q=%E6%93%8D%E4%BD%9C%E7%B3%BB%E7%BB%9F",
                    card_rules(".result", ".title", ".summary"),
                ),
                source(
                    "36氪",
                    "https://www.36kr.com/search/articles/%E6%93%8D%E4%BD%9C%E7%B3%BB%E7%BB%9F",
                    kr_rules(".search-result-item"),
                ),
            ],
        },
        CategoryConfig {
            id: "chip".to_string(),
            label: "芯片".to_string(),
            icon: "💾".to_string(),
            sources: vec![
                source(
                    "新华网",
                    "https://so.news.cn/#search/0/%E8%8A%AF%E7%89%87/1/0",
                    card_rules(".result-item", ".title", ".summary"),
                ),
                source(
                    "IT之家",
                    "https://www.ithome.com/search/%E8%8A%AF%E7%89%87.html",
                    card_rules(".lst li", "a", ".c"),
                ),
                source(
                    "36氪",
                    "https://www.36kr.com/search/articles/%E8%8A%AF%E7%89%87",
                    kr_rules(".search-result-item"),
                ),
            ],
        },
    ]
}
