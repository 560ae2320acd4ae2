// src/services/article.rs

//! Article page extraction.

use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::models::{Article, ExtractionConfig, Outcome};
use crate::services::selectors;
use crate::utils::clean_text;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static TWITTER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="twitter:title"]"#).unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static H2: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());

/// Result of extracting one article page.
///
/// `article` is always populated with at least its identity fields. `miss`
/// carries the reason when the content selector found nothing.
#[derive(Debug, Clone)]
pub struct ArticleExtraction {
    pub article: Article,
    pub miss: Option<String>,
}

/// Builds article records from detail pages.
pub struct ArticleExtractor {
    min_title_chars: usize,
}

impl ArticleExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            min_title_chars: config.min_title_chars,
        }
    }

    /// Extract using today's UTC date.
    pub fn extract(&self, content: &str, url: &str, content_selector: &str) -> ArticleExtraction {
        self.extract_on(content, url, content_selector, Utc::now().date_naive())
    }

    pub fn extract_on(
        &self,
        content: &str,
        url: &str,
        content_selector: &str,
        scraped_date: NaiveDate,
    ) -> ArticleExtraction {
        let partial = Article::partial(url, scraped_date);
        let miss = |article: Article, reason: String| {
            log::warn!("No content extracted from {url}: {reason}");
            ArticleExtraction {
                article,
                miss: Some(reason),
            }
        };

        let selector = match selectors::compile(content_selector) {
            Outcome::Success(selector) => selector,
            Outcome::Degraded { value, reason } => {
                log::debug!("{reason}");
                value
            }
            Outcome::Failure(reason) => return miss(partial, reason),
        };

        let document = Html::parse_document(content);
        let Some(node) = document.select(&selector).next() else {
            return miss(
                partial,
                format!("content selector '{content_selector}' matched nothing"),
            );
        };

        let article = Article {
            title: self.title(&document, node),
            raw_content: Some(node.html()),
            ..partial
        };
        ArticleExtraction {
            article,
            miss: None,
        }
    }

    /// First qualifying candidate in priority order.
    fn title(&self, document: &Html, content: ElementRef<'_>) -> Option<String> {
        let element_text = |el: ElementRef<'_>| el.text().collect::<String>();
        let meta_content =
            |el: ElementRef<'_>| el.value().attr("content").unwrap_or_default().to_string();

        let mut candidates: Vec<String> = Vec::new();
        candidates.extend(document.select(&TITLE).map(element_text));
        candidates.extend(document.select(&OG_TITLE).map(meta_content));
        candidates.extend(document.select(&TWITTER_TITLE).map(meta_content));

        let h1: Vec<String> = document.select(&H1).map(element_text).collect();
        if h1.is_empty() {
            candidates.extend(document.select(&H2).map(element_text));
        } else {
            candidates.extend(h1);
        }
        candidates.extend(content.select(&H1).map(element_text));

        candidates
            .into_iter()
            .map(|text| clean_text(&text))
            .find(|text| text.chars().count() > self.min_title_chars)
    }
}

impl Default for ArticleExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://x.test/news/1";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn extract(html: &str, selector: &str) -> ArticleExtraction {
        ArticleExtractor::default().extract_on(html, URL, selector, date())
    }

    #[test]
    fn test_raw_content_is_verbatim_outer_markup() {
        let html = r#"<html><body><div class="entry"><p>One <img src="/i.jpg"></p></div></body></html>"#;
        let result = extract(html, ".entry");
        assert!(result.miss.is_none());
        let raw = result.article.raw_content.unwrap();
        assert!(raw.starts_with(r#"<div class="entry">"#));
        assert!(raw.contains(r#"<img src="/i.jpg">"#));
        assert_eq!(result.article.source_url, "https://x.test");
        assert_eq!(result.article.scraped_date, date());
    }

    #[test]
    fn test_title_falls_back_to_document_title() {
        let html = r#"<html><head><title>Quarterly report</title></head>
            <body><div class="entry"><p>text</p></div></body></html>"#;
        let result = extract(html, ".entry");
        assert_eq!(result.article.title.as_deref(), Some("Quarterly report"));
    }

    #[test]
    fn test_no_title_candidates_is_none() {
        let html = r#"<html><body><div class="entry"><p>text</p></div></body></html>"#;
        let result = extract(html, ".entry");
        assert!(result.miss.is_none());
        assert!(result.article.title.is_none());
    }

    #[test]
    fn test_priority_beats_length() {
        let html = r#"<html><head>
              <title>Short title</title>
              <meta property="og:title" content="A much longer open graph title here">
            </head><body><h1>Heading one is long too</h1><div class="entry"></div></body></html>"#;
        let result = extract(html, ".entry");
        assert_eq!(result.article.title.as_deref(), Some("Short title"));
    }

    #[test]
    fn test_short_candidates_are_skipped() {
        let html = r#"<html><head><title>News</title>
              <meta name="twitter:title" content="Twitter card headline">
            </head><body><div class="entry"></div></body></html>"#;
        let result = extract(html, ".entry");
        assert_eq!(result.article.title.as_deref(), Some("Twitter card headline"));
    }

    #[test]
    fn test_h2_only_used_without_h1() {
        let with_h1 = r#"<body><h1>Main heading</h1><h2>Secondary heading</h2><div class="entry"></div></body>"#;
        assert_eq!(
            extract(with_h1, ".entry").article.title.as_deref(),
            Some("Main heading")
        );

        let without_h1 = r#"<body><h2>Secondary heading</h2><div class="entry"></div></body>"#;
        assert_eq!(
            extract(without_h1, ".entry").article.title.as_deref(),
            Some("Secondary heading")
        );
    }

    #[test]
    fn test_selector_miss_returns_partial_record() {
        let html = r#"<html><head><title>Has a title</title></head><body></body></html>"#;
        let result = extract(html, ".entry");
        assert!(result.miss.is_some());
        assert_eq!(result.article.id, crate::models::article_id(URL));
        assert_eq!(result.article.url, URL);
        assert!(result.article.raw_content.is_none());
        assert!(result.article.title.is_none());
    }

    #[test]
    fn test_invalid_selector_does_not_panic() {
        let result = extract("<html></html>", "[[");
        assert!(result.miss.is_some());
    }
}
