// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Headless browser settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Extraction and pagination heuristics
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Artifact locations
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        let (min, max) = self.crawler.delay_range();
        if min < 0.0 || max < min {
            return Err(AppError::validation(format!(
                "crawler delay range [{min}, {max}] is invalid"
            )));
        }
        if self.crawler.engines.is_empty() {
            return Err(AppError::validation("crawler.engines must not be empty"));
        }
        if self.extraction.max_page_ceiling == 0 {
            return Err(AppError::validation(
                "extraction.max_page_ceiling must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests and robots.txt matching
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Lower bound of the randomized post-fetch delay
    #[serde(default = "defaults::delay_min")]
    pub delay_min_secs: f64,

    /// Upper bound of the randomized post-fetch delay
    #[serde(default = "defaults::delay_max")]
    pub delay_max_secs: f64,

    /// Legacy single delay value, mapped to `[0.5, delay_secs]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<f64>,

    /// Honor robots.txt
    #[serde(default = "defaults::respect_robots")]
    pub respect_robots: bool,

    /// Rotate realistic browser headers per request
    #[serde(default = "defaults::rotate_headers")]
    pub rotate_headers: bool,

    /// Proxy endpoints, used round-robin
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Engine probe order
    #[serde(default = "defaults::engines")]
    pub engines: Vec<EngineKind>,
}

impl CrawlerConfig {
    /// Effective `(min, max)` delay in seconds.
    pub fn delay_range(&self) -> (f64, f64) {
        match self.delay_secs {
            Some(single) => (defaults::LEGACY_DELAY_FLOOR.min(single), single),
            None => (self.delay_min_secs, self.delay_max_secs),
        }
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            delay_min_secs: defaults::delay_min(),
            delay_max_secs: defaults::delay_max(),
            delay_secs: None,
            respect_robots: defaults::respect_robots(),
            rotate_headers: defaults::rotate_headers(),
            proxies: Vec::new(),
            engines: defaults::engines(),
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Launch Chromium with `--no-sandbox`
    #[serde(default = "defaults::no_sandbox")]
    pub no_sandbox: bool,

    /// Wait after each "load more" click, in milliseconds
    #[serde(default = "defaults::settle_ms")]
    pub settle_ms: u64,

    /// Click budget when no page cap is given
    #[serde(default = "defaults::default_max_clicks")]
    pub default_max_clicks: usize,

    /// Explicit Chromium executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
}

impl BrowserConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            no_sandbox: defaults::no_sandbox(),
            settle_ms: defaults::settle_ms(),
            default_max_clicks: defaults::default_max_clicks(),
            executable: None,
        }
    }
}

/// Extraction heuristics. These are empirically tuned, not exact semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Archive pages shorter than this are treated as "likely empty"
    #[serde(default = "defaults::min_page_bytes")]
    pub min_page_bytes: usize,

    /// Hard ceiling on enumerated archive pages
    #[serde(default = "defaults::max_page_ceiling")]
    pub max_page_ceiling: usize,

    /// Article title candidates must be longer than this many characters
    #[serde(default = "defaults::min_title_chars")]
    pub min_title_chars: usize,

    /// Archive item title selectors, in priority order
    #[serde(default = "defaults::title_selectors")]
    pub title_selectors: Vec<String>,

    /// Image attributes probed for thumbnails, in priority order
    #[serde(default = "defaults::thumbnail_attrs")]
    pub thumbnail_attrs: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_page_bytes: defaults::min_page_bytes(),
            max_page_ceiling: defaults::max_page_ceiling(),
            min_title_chars: defaults::min_title_chars(),
            title_selectors: defaults::title_selectors(),
            thumbnail_attrs: defaults::thumbnail_attrs(),
        }
    }
}

/// Artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for corpus files and URL lists
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,

    /// Directory for log files
    #[serde(default = "defaults::log_dir")]
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            log_dir: defaults::log_dir(),
        }
    }
}

mod defaults {
    use crate::engine::EngineKind;

    pub const LEGACY_DELAY_FLOOR: f64 = 0.5;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; corpus-scraper/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn delay_min() -> f64 {
        0.5
    }
    pub fn delay_max() -> f64 {
        1.0
    }
    pub fn respect_robots() -> bool {
        true
    }
    pub fn rotate_headers() -> bool {
        true
    }
    pub fn engines() -> Vec<EngineKind> {
        vec![EngineKind::Http, EngineKind::Browser]
    }

    // Browser defaults
    pub fn no_sandbox() -> bool {
        true
    }
    pub fn settle_ms() -> u64 {
        1000
    }
    pub fn default_max_clicks() -> usize {
        10
    }

    // Extraction defaults
    pub fn min_page_bytes() -> usize {
        1000
    }
    pub fn max_page_ceiling() -> usize {
        1000
    }
    pub fn min_title_chars() -> usize {
        5
    }
    pub fn title_selectors() -> Vec<String> {
        [
            "h1",
            "h2",
            "h3",
            ".title",
            ".headline",
            ".post-title",
            ".article-title",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn thumbnail_attrs() -> Vec<String> {
        ["src", "data-src", "data-lazy-src", "data-original", "data-lazy"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    // Output defaults
    pub fn data_dir() -> String {
        "data/raw".into()
    }
    pub fn log_dir() -> String {
        "logs".into()
    }
}
