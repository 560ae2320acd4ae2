//! Utility functions and helpers.

pub mod http;
pub mod log;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SLUG_INVALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-]").unwrap());
static SLUG_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Slug used when a project name normalizes to nothing.
pub const DEFAULT_SLUG: &str = "scraper_output";

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// Scheme and host (with non-default port) of a URL, e.g. `https://x.test`.
pub fn source_url(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    url.host_str()?;
    Some(url.origin().ascii_serialization())
}

/// An archive URL needs a scheme, a host and a path beyond the site root.
pub fn is_archive_url(url_str: &str) -> bool {
    match Url::parse(url_str) {
        Ok(url) => url.has_host() && url.path().len() > 1,
        Err(_) => false,
    }
}

/// Collapse whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Normalize a project name for artifact file names.
///
/// `"Irrawaddy News"` becomes `"irrawaddy_news"`.
pub fn normalize_slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let spaced = WHITESPACE.replace_all(&lowered, "_");
    let stripped = SLUG_INVALID.replace_all(&spaced, "");
    let collapsed = SLUG_UNDERSCORES.replace_all(&stripped, "_");
    let slug = collapsed.trim_matches('_');

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug.to_string()
    }
}
