// src/models/mod.rs

//! Domain models for the scraper.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod article;
mod config;
mod job;
mod outcome;
mod stats;
mod url_list;

// Re-export all public types
pub use article::{ArchiveItem, Article, article_id};
pub use config::{BrowserConfig, Config, CrawlerConfig, ExtractionConfig, OutputConfig};
pub use job::{PAGE_TOKEN, PaginationMode, ScrapeJob};
pub use outcome::Outcome;
pub use stats::{CrawlStats, RunReport, RunStatus};
pub use url_list::UrlList;
