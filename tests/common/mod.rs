// tests/common/mod.rs
//
// In-memory fetcher and config builders shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tech_news_roundup::config::{
    AppConfig, CategoryConfig, CompiledCategory, PipelineSettings, SelectorRule, SourceConfig,
};
use tech_news_roundup::fetcher::{FetchError, PageFetcher};
use url::Url;

pub enum Reply {
    Page(String),
    Fail(FetchError),
    /// Never answers within any reasonable test deadline.
    Stall,
}

/// Serves canned replies by URL; anything unknown is a 404.
#[derive(Default)]
pub struct StubFetcher {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.replies.insert(url.to_string(), Reply::Page(html.into()));
        self
    }

    pub fn fail(mut self, url: &str, err: FetchError) -> Self {
        self.replies.insert(url.to_string(), Reply::Fail(err));
        self
    }

    pub fn stall(mut self, url: &str) -> Self {
        self.replies.insert(url.to_string(), Reply::Stall);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.replies.get(url.as_str()) {
            Some(Reply::Page(html)) => Ok(html.clone()),
            Some(Reply::Fail(err)) => Err(err.clone()),
            Some(Reply::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Timeout)
            }
            None => Err(FetchError::Status(404)),
        }
    }
}

pub fn card_rule() -> SelectorRule {
    SelectorRule {
        item: ".card".to_string(),
        title: Some(".title".to_string()),
        summary: Some(".teaser".to_string()),
        link_attr: "href".to_string(),
    }
}

pub fn source(name: &str, url: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        rules: vec![card_rule()],
    }
}

pub fn category(id: &str, sources: Vec<SourceConfig>) -> CategoryConfig {
    CategoryConfig {
        id: id.to_string(),
        label: id.to_uppercase(),
        icon: String::new(),
        sources,
    }
}

pub fn compile(categories: Vec<CategoryConfig>) -> Vec<CompiledCategory> {
    AppConfig {
        categories,
        ..AppConfig::default()
    }
    .compile()
    .expect("test config compiles")
}

pub fn settings() -> PipelineSettings {
    PipelineSettings::default()
}

/// A listing page with one `.card` per `(title, href)`.
pub fn listing(cards: &[(&str, &str)]) -> String {
    let body: String = cards
        .iter()
        .map(|(title, href)| {
            format!(
                r#"<div class="card"><h2 class="title"><a href="{href}">{title}</a></h2><p class="teaser">About {title}</p></div>"#
            )
        })
        .collect();
    format!("<html><body>{body}</body></html>")
}

/// An article page whose lead paragraph mentions `title`.
pub fn article(title: &str) -> String {
    format!(
        "<html><body><h1>{title}</h1><p>Lead paragraph for {title}, long enough to be used.</p></body></html>"
    )
}
