//! Outbound page fetching.
//!
//! [`PageFetcher`] is the seam between the pipeline and the network: the
//! aggregator and the enricher only ever see `fetch(url) -> markup | FetchError`.
//! [`HttpFetcher`] is the production implementation; it is wrapped in
//! [`crate::retry::RetryFetch`] by [`build_fetcher`] to get the retry budget.
//!
//! # Politeness
//!
//! Every request waits a random delay inside the configured range first, and a
//! semaphore bounds how many requests are in flight across the whole process.
//!
//! # Decoding
//!
//! Pages are decoded using, in order: the `Content-Type` charset, a
//! `<meta charset>` declaration near the top of the document, UTF-8 when the
//! bytes are valid UTF-8, and finally the configured fallback encoding.

use crate::config::{ConfigError, FetchSettings};
use crate::retry::RetryFetch;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en-US;q=0.5,en;q=0.3";

/// How far into a document we look for a `<meta charset>`.
const META_SNIFF_BYTES: usize = 2048;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_\-:.]+)"#)
        .expect("meta charset regex is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: Box<FetchError> },
    #[error("could not decode page body: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connect(_) | FetchError::Transport(_) => true,
            FetchError::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else if e.is_request() || e.is_body() || e.is_decode() {
            FetchError::Transport(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

/// Fetch a page and return its markup as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

#[async_trait]
impl<T> PageFetcher for Arc<T>
where
    T: PageFetcher + ?Sized,
{
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        (**self).fetch(url).await
    }
}

/// Single-attempt HTTP fetcher with a fixed identity.
pub struct HttpFetcher {
    client: Client,
    permits: Semaphore,
    delay_ms: (u64, u64),
    fallback: &'static Encoding,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("available_permits", &self.permits.available_permits())
            .field("delay_ms", &self.delay_ms)
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, ConfigError> {
        let fallback = Encoding::for_label(settings.fallback_encoding.as_bytes()).ok_or_else(|| {
            ConfigError::Setting(format!(
                "fetch.fallback_encoding `{}` is not a known encoding",
                settings.fallback_encoding
            ))
        })?;

        let client = Client::builder()
            .default_headers(default_headers())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Setting(format!("http client: {e}")))?;

        Ok(Self {
            client,
            permits: Semaphore::new(settings.max_in_flight.max(1)),
            delay_ms: (settings.delay_min_ms, settings.delay_max_ms),
            fallback,
        })
    }

    async fn politeness_delay(&self) {
        let (min, max) = self.delay_ms;
        if max == 0 {
            return;
        }
        let ms = rng().random_range(min..=max);
        sleep(Duration::from_millis(ms)).await;
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
    headers
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        self.politeness_delay().await;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::Other(e.to_string()))?;

        let t0 = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        let text = decode_body(&bytes, content_type.as_deref(), self.fallback)?;
        debug!(
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(text)
    }
}

/// Pull the `charset=` parameter out of a `Content-Type` value.
fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn charset_from_meta(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_SNIFF_BYTES)];
    let head = String::from_utf8_lossy(head);
    META_CHARSET
        .captures(&head)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Decode a page body to text.
pub fn decode_body(
    bytes: &[u8],
    content_type: Option<&str>,
    fallback: &'static Encoding,
) -> Result<String, FetchError> {
    let declared = content_type
        .and_then(charset_from_content_type)
        .map(str::to_string)
        .or_else(|| charset_from_meta(bytes));

    if let Some(label) = declared {
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                let (text, _, had_errors) = encoding.decode(bytes);
                if had_errors {
                    debug!(encoding = encoding.name(), "Declared charset had malformed sequences");
                }
                return Ok(text.into_owned());
            }
            None => warn!(%label, "Ignoring unknown charset label"),
        }
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.trim_start_matches('\u{feff}').to_string());
    }

    let (text, _, had_errors) = fallback.decode(bytes);
    if had_errors && fallback != UTF_8 {
        return Err(FetchError::Decode(format!(
            "body is neither UTF-8 nor {}",
            fallback.name()
        )));
    }
    Ok(text.into_owned())
}

/// Build the production fetcher: HTTP with politeness, wrapped in the retry policy.
pub fn build_fetcher(settings: &FetchSettings) -> Result<Arc<dyn PageFetcher>, ConfigError> {
    let http = HttpFetcher::new(settings)?;
    let retrying = RetryFetch::new(
        http,
        settings.max_attempts,
        Duration::from_millis(settings.backoff_base_ms),
    )
    .with_max_delay(Duration::from_millis(settings.backoff_max_ms));
    Ok(Arc::new(retrying))
}
