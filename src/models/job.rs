// src/models/job.rs

//! Per-run operator inputs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::error::{AppError, Result};
use crate::storage::StorageFormat;
use crate::utils::is_archive_url;

/// Literal token replaced by the page number in pagination templates.
pub const PAGE_TOKEN: &str = "{n}";

/// How archive pages beyond the first are reached. One mode per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationMode {
    /// Only the base archive URL
    None,
    /// Substitute the page counter into a template such as `?page={n}` or `/page/{n}`
    QueryParam { template: String },
    /// Click a "load more" control inside a live browser page
    LoadMore { button_selector: String },
    /// Infinite scroll; only the base URL is visited
    Scroll,
}

impl PaginationMode {
    /// Reject templates and parameters that can never enumerate pages.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::QueryParam { template } if !template.contains(PAGE_TOKEN) => {
                Err(AppError::config(format!(
                    "pagination template '{template}' has no {PAGE_TOKEN} token"
                )))
            }
            Self::LoadMore { button_selector } if button_selector.trim().is_empty() => Err(
                AppError::config("load-more pagination needs a button selector"),
            ),
            _ => Ok(()),
        }
    }
}

/// Everything one scrape run needs beyond [`crate::models::Config`].
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub archive_url: String,
    pub archive_selector: String,
    pub content_selector: String,
    pub thumbnail_selector: Option<String>,
    pub pagination: PaginationMode,
    pub max_pages: Option<usize>,
    pub output: PathBuf,
    pub format: StorageFormat,
    pub force_engine: Option<EngineKind>,
    pub resume: bool,
    /// URL-list handoff file, written after the archive phase
    pub urls_file: Option<PathBuf>,
    /// Read URLs from `urls_file` instead of crawling the archive
    pub skip_archive: bool,
}

impl ScrapeJob {
    /// Startup checks; any error here is fatal before fetching begins.
    pub fn validate(&self) -> Result<()> {
        if self.skip_archive {
            if self.urls_file.is_none() {
                return Err(AppError::config("skip-archive mode needs a URLs file"));
            }
        } else {
            if !is_archive_url(&self.archive_url) {
                return Err(AppError::config(format!(
                    "'{}' is not an archive URL (scheme, host and a path beyond '/' are required)",
                    self.archive_url
                )));
            }
            if self.archive_selector.trim().is_empty() {
                return Err(AppError::config("archive selector is empty"));
            }
        }
        if self.content_selector.trim().is_empty() {
            return Err(AppError::config("content selector is empty"));
        }
        if self.max_pages == Some(0) {
            return Err(AppError::config("max pages must be at least 1"));
        }
        self.pagination.validate()
    }
}
