//! Link resolution against a page's base URL.

use url::Url;

/// Resolve a possibly relative `href` found on the page at `base`.
///
/// - `//host/path` adopts the base scheme
/// - `/path` adopts the base scheme and host
/// - absolute http(s) links pass through
/// - `path` joins against the base directory
///
/// Empty, fragment-only, unparsable and non-web links (`javascript:`,
/// `mailto:`) resolve to `base` itself so no candidate is lost for lack of a
/// usable link.
pub fn resolve(href: &str, base: &Url) -> Url {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return base.clone();
    }
    match base.join(href) {
        Ok(url) if is_web_url(&url) => url,
        _ => base.clone(),
    }
}

/// `true` for http(s) URLs that carry a host.
pub fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}
