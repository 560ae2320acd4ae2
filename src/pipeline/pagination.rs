// src/pipeline/pagination.rs

//! Archive page enumeration.
//!
//! The pagination mode is fixed for the run. Page 1 is always the base archive
//! URL. Only query-parameter pagination goes further, one fetch per page, and
//! it stops on the first page that fails, looks empty, or hits a limit.

use crate::engine::FetchEngine;
use crate::models::{BrowserConfig, ExtractionConfig, Outcome, PAGE_TOKEN, PaginationMode};

/// One archive page and its fetched content.
#[derive(Debug, Clone)]
pub struct ArchivePage {
    pub number: usize,
    pub url: String,
    pub content: Outcome<String>,
}

/// Pagination state for one archive phase.
#[derive(Debug, Clone)]
pub struct Paginator {
    mode: PaginationMode,
    base_url: String,
    page: usize,
    max_pages: Option<usize>,
    min_page_bytes: usize,
    ceiling: usize,
    default_max_clicks: usize,
    finished: bool,
}

impl Paginator {
    pub fn new(
        mode: PaginationMode,
        base_url: impl Into<String>,
        max_pages: Option<usize>,
        extraction: &ExtractionConfig,
        browser: &BrowserConfig,
    ) -> Self {
        Self {
            mode,
            base_url: base_url.into(),
            page: 0,
            max_pages,
            min_page_bytes: extraction.min_page_bytes,
            ceiling: extraction.max_page_ceiling,
            default_max_clicks: browser.default_max_clicks,
            finished: false,
        }
    }

    /// Pages yielded so far.
    pub fn pages_visited(&self) -> usize {
        self.page
    }

    /// URL of page `number` (1-based).
    pub fn page_url(&self, number: usize) -> String {
        match &self.mode {
            PaginationMode::QueryParam { template } if number > 1 => {
                substitute(&self.base_url, template, number)
            }
            _ => self.base_url.clone(),
        }
    }

    /// Click budget for load-more pagination.
    pub fn max_clicks(&self) -> usize {
        match self.max_pages {
            Some(pages) => pages.saturating_sub(1),
            None => self.default_max_clicks,
        }
    }

    /// Fetch the next archive page, or `None` once enumeration has ended.
    pub async fn next_page<E: FetchEngine + ?Sized>(&mut self, engine: &mut E) -> Option<ArchivePage> {
        if self.finished {
            return None;
        }
        let number = self.page + 1;
        if number > self.ceiling {
            log::warn!(
                "Stopping pagination at the safety ceiling of {} pages",
                self.ceiling
            );
            self.finished = true;
            return None;
        }
        if self.max_pages.is_some_and(|cap| number > cap) {
            log::info!("Reached the page cap of {}", number - 1);
            self.finished = true;
            return None;
        }

        let url = self.page_url(number);
        let content = if number == 1 {
            self.first_page(engine, &url).await
        } else {
            match engine.fetch(&url).await {
                Outcome::Failure(reason) => {
                    log::info!("Pagination ended at page {number}: {reason}");
                    self.finished = true;
                    return None;
                }
                outcome => {
                    let size = outcome.value().map_or(0, String::len);
                    if size < self.min_page_bytes {
                        log::info!(
                            "Pagination ended at page {number}: {size} bytes looks like an empty page"
                        );
                        self.finished = true;
                        return None;
                    }
                    outcome
                }
            }
        };

        self.page = number;
        Some(ArchivePage {
            number,
            url,
            content,
        })
    }

    async fn first_page<E: FetchEngine + ?Sized>(&mut self, engine: &mut E, url: &str) -> Outcome<String> {
        let mode = self.mode.clone();
        match &mode {
            PaginationMode::None => {
                self.finished = true;
                engine.fetch(url).await
            }
            PaginationMode::Scroll => {
                log::warn!("Infinite scroll is not supported; only {url} is visited");
                self.finished = true;
                engine.fetch(url).await
            }
            PaginationMode::LoadMore { button_selector } => {
                self.finished = true;
                match engine.load_more(url, button_selector, self.max_clicks()).await {
                    Some(outcome) => outcome,
                    None => {
                        log::warn!(
                            "{} engine cannot click load-more controls; fetching {url} once",
                            engine.kind()
                        );
                        engine.fetch(url).await
                    }
                }
            }
            PaginationMode::QueryParam { .. } => {
                let outcome = engine.fetch(url).await;
                if outcome.is_failure() {
                    self.finished = true;
                }
                outcome
            }
        }
    }
}

/// Literal substitution of the page token into a template.
///
/// `?page={n}` and `&page={n}` are appended to the base (joining onto an
/// existing query with `&`); path templates such as `/page/{n}/` are joined
/// with a single slash; absolute templates are used as-is.
pub fn substitute(base_url: &str, template: &str, number: usize) -> String {
    let filled = template.replace(PAGE_TOKEN, &number.to_string());
    if filled.starts_with("http://") || filled.starts_with("https://") {
        return filled;
    }
    match filled.chars().next() {
        Some('?') if base_url.contains('?') => format!("{base_url}&{}", &filled[1..]),
        Some('?') | Some('&') => format!("{base_url}{filled}"),
        _ => format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            filled.trim_start_matches('/')
        ),
    }
}
