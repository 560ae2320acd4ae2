// src/pipeline/scrape.rs

//! Scrape orchestration.
//!
//! One run is two phases on one sequential task: collect article URLs from the
//! archive pages, then fetch, extract and store each article. Engines are
//! probed per phase and torn down on every exit path. Statistics are kept in
//! the run and returned in the [`RunReport`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineFactory, FetchEngine, Guarded, GuardedFactory, probe, select_for_phase};
use crate::error::{AppError, Result};
use crate::models::{
    Config, CrawlStats, Outcome, RunReport, RunStatus, ScrapeJob, UrlList, article_id,
};
use crate::pipeline::pagination::Paginator;
use crate::services::{ArchiveExtractor, ArticleExtractor, RobotsPolicy};
use crate::storage::{ArticleSink, ResumeLedger, open_sink};
use crate::utils::log;

const ARCHIVE_PHASE: &str = "archive pages";
const DETAIL_PHASE: &str = "detail pages";

/// How a phase ended.
enum Step<T> {
    Done(T),
    Interrupted,
}

/// Unique article URLs in first-seen order, plus archive thumbnails.
#[derive(Debug, Default)]
struct Collected {
    urls: Vec<String>,
    thumbnails: HashMap<String, String>,
}

/// Engines owned by the run, one slot per phase.
struct Engines<E> {
    archive: Option<E>,
    detail: Option<E>,
}

impl<E: FetchEngine> Engines<E> {
    async fn teardown(&mut self) {
        for mut engine in [self.archive.take(), self.detail.take()].into_iter().flatten() {
            engine.teardown().await;
        }
    }
}

/// Run `work` unless `cancel` fires first.
async fn race<T>(cancel: &CancellationToken, work: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        value = work => Some(value),
    }
}

/// Orchestrates archive collection and article harvesting.
pub struct Scraper<F: EngineFactory> {
    config: Arc<Config>,
    factory: GuardedFactory<F>,
    archive: ArchiveExtractor,
    articles: ArticleExtractor,
}

impl<F: EngineFactory> Scraper<F> {
    pub fn new(config: Arc<Config>, factory: F, robots: Arc<dyn RobotsPolicy>) -> Self {
        let factory = GuardedFactory::new(factory, robots, config.crawler.user_agent.clone());
        Self {
            archive: ArchiveExtractor::new(&config.extraction),
            articles: ArticleExtractor::new(&config.extraction),
            factory,
            config,
        }
    }

    /// Run one scrape job.
    ///
    /// Configuration and output-format problems are returned as errors before
    /// anything is fetched. Everything after that ends in a report.
    pub async fn run(&self, job: &ScrapeJob, cancel: &CancellationToken) -> Result<RunReport> {
        self.config.validate()?;
        job.validate()?;

        let mut sink = open_sink(&job.output, job.format).await?;
        let mut ledger = if job.resume {
            ResumeLedger::from_sink(sink.as_ref()).await?
        } else {
            ResumeLedger::new()
        };

        let started_at = Utc::now();
        let source = match (&job.urls_file, job.skip_archive) {
            (Some(path), true) => path.display().to_string(),
            _ => job.archive_url.clone(),
        };
        log::header(&format!("Scraping {source}"));
        log::sub_item(&format!("Output: {} ({:?})", job.output.display(), job.format));

        let mut stats = CrawlStats::default();
        let mut engines = Engines {
            archive: None,
            detail: None,
        };

        let outcome = self
            .execute(job, sink.as_mut(), &mut ledger, &mut stats, &mut engines, cancel)
            .await;
        let status = match outcome {
            Ok(Step::Done(())) => {
                log::success("Scrape complete");
                RunStatus::Completed
            }
            Ok(Step::Interrupted) => {
                log::warn("Interrupted; shutting down engines");
                RunStatus::Interrupted
            }
            Err(e) => {
                log::error(&format!("Scrape failed: {e}"));
                RunStatus::Failed(e.to_string())
            }
        };
        engines.teardown().await;

        let report = RunReport {
            status,
            stats,
            started_at,
            finished_at: Utc::now(),
        };
        log::summary("Scrape statistics", &report.stats.summary_rows());
        Ok(report)
    }

    async fn execute(
        &self,
        job: &ScrapeJob,
        sink: &mut dyn ArticleSink,
        ledger: &mut ResumeLedger,
        stats: &mut CrawlStats,
        engines: &mut Engines<Guarded<F::Engine>>,
        cancel: &CancellationToken,
    ) -> Result<Step<()>> {
        let collected = if job.skip_archive {
            let path = job
                .urls_file
                .as_deref()
                .ok_or_else(|| AppError::config("skip-archive mode needs a URLs file"))?;
            let list = UrlList::load(path).await?;
            log::info(&format!(
                "Loaded {} URLs from {}",
                list.urls.len(),
                path.display()
            ));
            Collected {
                urls: list.urls,
                thumbnails: HashMap::new(),
            }
        } else {
            log::step(1, 2, "Collecting article URLs from archive pages");
            let selection = select_for_phase(
                &self.factory,
                job.force_engine,
                ARCHIVE_PHASE,
                &job.archive_url,
                &job.archive_selector,
            );
            let Some(selected) = race(cancel, selection).await else {
                return Ok(Step::Interrupted);
            };
            let engine = engines.archive.insert(selected?);

            if job.force_engine.is_some() {
                self.validate_archive(engine, job).await?;
            }

            let collected = match self.collect(engine, job, stats, cancel).await {
                Step::Done(collected) => collected,
                Step::Interrupted => return Ok(Step::Interrupted),
            };

            if let Some(path) = &job.urls_file {
                let list = UrlList::new(
                    &job.archive_url,
                    &job.archive_selector,
                    &job.content_selector,
                    collected.urls.clone(),
                );
                match list.save(path).await {
                    Ok(()) => log::info(&format!(
                        "Saved {} URLs to {}",
                        list.total_urls,
                        path.display()
                    )),
                    Err(e) => log::warn(&format!("Could not save URL list: {e}")),
                }
            }
            collected
        };

        if collected.urls.is_empty() {
            log::warn("No article URLs collected; nothing to fetch");
            return Ok(Step::Done(()));
        }

        log::step(
            2,
            2,
            &format!("Fetching {} articles", collected.urls.len()),
        );
        match self.select_detail_engine(job, &collected.urls[0], engines, cancel).await? {
            Step::Done(()) => {}
            Step::Interrupted => return Ok(Step::Interrupted),
        }
        let Some(engine) = engines.detail.as_mut() else {
            return Err(AppError::no_engine(DETAIL_PHASE));
        };

        Ok(self
            .fetch_articles(engine, job, &collected, sink, ledger, stats, cancel)
            .await)
    }

    /// A forced archive engine has skipped probing; check it once here.
    async fn validate_archive<E: FetchEngine>(&self, engine: &mut E, job: &ScrapeJob) -> Result<()> {
        let result = probe(engine, &job.archive_url, &job.archive_selector).await;
        if result.ok {
            log::info(&format!("Archive validated: {}", result.message));
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "archive validation failed: {}",
                result.message
            )))
        }
    }

    /// Probe with the first collected URL; reuse the archive engine if nothing qualifies.
    async fn select_detail_engine(
        &self,
        job: &ScrapeJob,
        sample_url: &str,
        engines: &mut Engines<Guarded<F::Engine>>,
        cancel: &CancellationToken,
    ) -> Result<Step<()>> {
        if job.force_engine.is_some() && engines.archive.is_some() {
            engines.detail = engines.archive.take();
            return Ok(Step::Done(()));
        }

        let selection = select_for_phase(
            &self.factory,
            job.force_engine,
            DETAIL_PHASE,
            sample_url,
            &job.content_selector,
        );
        let Some(selected) = race(cancel, selection).await else {
            return Ok(Step::Interrupted);
        };

        match selected {
            Ok(engine) => {
                engines.detail = Some(engine);
                if let Some(mut archive) = engines.archive.take() {
                    archive.teardown().await;
                }
            }
            Err(e @ AppError::NoEngine { .. }) if engines.archive.is_some() => {
                log::warn(&format!("{e}; reusing the archive engine"));
                engines.detail = engines.archive.take();
            }
            Err(e) => return Err(e),
        }
        Ok(Step::Done(()))
    }

    /// Walk the archive pages and collect unique article URLs.
    async fn collect<E: FetchEngine>(
        &self,
        engine: &mut E,
        job: &ScrapeJob,
        stats: &mut CrawlStats,
        cancel: &CancellationToken,
    ) -> Step<Collected> {
        let mut paginator = Paginator::new(
            job.pagination.clone(),
            &job.archive_url,
            job.max_pages,
            &self.config.extraction,
            &self.config.browser,
        );
        let mut collected = Collected::default();
        let mut seen = HashSet::new();

        loop {
            let Some(next) = race(cancel, paginator.next_page(engine)).await else {
                return Step::Interrupted;
            };
            let Some(page) = next else {
                break;
            };

            let content = match page.content {
                Outcome::Success(content) => content,
                Outcome::Degraded { value, reason } => {
                    log::warn(&format!("Archive page {}: {reason}", page.number));
                    value
                }
                Outcome::Failure(reason) => {
                    stats.errors += 1;
                    log::warn(&format!(
                        "Archive page {} ({}) failed: {reason}",
                        page.number, page.url
                    ));
                    continue;
                }
            };

            let items = self.archive.extract(
                &content,
                &job.archive_selector,
                job.thumbnail_selector.as_deref(),
                &page.url,
            );
            if items.is_empty() {
                log::warn(&format!(
                    "Archive page {} ({}) yielded no items; skipped",
                    page.number, page.url
                ));
                continue;
            }

            stats.pages_processed += 1;
            stats.items_found += items.len();
            let before = collected.urls.len();
            for item in items {
                if seen.insert(item.url.clone()) {
                    if let Some(thumbnail) = item.thumbnail_url {
                        collected.thumbnails.insert(item.url.clone(), thumbnail);
                    }
                    collected.urls.push(item.url);
                }
            }
            log::info(&format!(
                "Archive page {}: {} new URLs ({} total)",
                page.number,
                collected.urls.len() - before,
                collected.urls.len()
            ));
        }

        Step::Done(collected)
    }

    /// Fetch, extract and store each collected article once.
    #[allow(clippy::too_many_arguments)]
    async fn fetch_articles<E: FetchEngine>(
        &self,
        engine: &mut E,
        job: &ScrapeJob,
        collected: &Collected,
        sink: &mut dyn ArticleSink,
        ledger: &mut ResumeLedger,
        stats: &mut CrawlStats,
        cancel: &CancellationToken,
    ) -> Step<()> {
        let total = collected.urls.len();

        for (index, url) in collected.urls.iter().enumerate() {
            if cancel.is_cancelled() {
                return Step::Interrupted;
            }
            let position = format!("[{}/{total}]", index + 1);

            let id = article_id(url);
            if ledger.contains(&id) {
                stats.skipped += 1;
                log::debug(&format!("{position} Already stored: {url}"));
                continue;
            }

            let Some(fetched) = race(cancel, engine.fetch(url)).await else {
                return Step::Interrupted;
            };
            stats.processed += 1;

            let content = match fetched {
                Outcome::Success(content) => content,
                Outcome::Degraded { value, reason } => {
                    log::warn(&format!("{position} {url}: {reason}"));
                    value
                }
                Outcome::Failure(reason) => {
                    stats.errors += 1;
                    log::warn(&format!("{position} Fetch failed for {url}: {reason}"));
                    continue;
                }
            };

            let extraction = self.articles.extract(&content, url, &job.content_selector);
            if let Some(reason) = &extraction.miss {
                stats.skipped += 1;
                log::warn(&format!("{position} Skipped {url}: {reason}"));
                continue;
            }

            let article = extraction
                .article
                .with_thumbnail(collected.thumbnails.get(url).cloned());
            match sink.save(&article).await {
                Ok(()) => {
                    stats.saved += 1;
                    ledger.record(id);
                    log::info(&format!(
                        "{position} Saved: {}",
                        article.title.as_deref().unwrap_or(url)
                    ));
                }
                Err(e) => {
                    stats.errors += 1;
                    log::error(&format!("{position} Could not save {url}: {e}"));
                }
            }
        }

        Step::Done(())
    }
}
