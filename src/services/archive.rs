// src/services/archive.rs

//! Archive page item extraction.
//!
//! Turns one listing page into [`ArchiveItem`] stubs in document order. A
//! broken item is logged and skipped; it never costs the rest of the page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{ArchiveItem, ExtractionConfig, Outcome};
use crate::services::selectors;
use crate::utils::{clean_text, resolve_url};

static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Extracts article stubs from archive pages.
pub struct ArchiveExtractor {
    title_selectors: Vec<Selector>,
    thumbnail_attrs: Vec<String>,
}

impl ArchiveExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        let title_selectors = config
            .title_selectors
            .iter()
            .filter_map(|s| match selectors::parse(s) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    log::warn!("Ignoring title selector: {e}");
                    None
                }
            })
            .collect();

        Self {
            title_selectors,
            thumbnail_attrs: config.thumbnail_attrs.clone(),
        }
    }

    /// Extract every item block matched by `item_selector`.
    pub fn extract(
        &self,
        content: &str,
        item_selector: &str,
        thumbnail_selector: Option<&str>,
        base_url: &str,
    ) -> Vec<ArchiveItem> {
        let Ok(base) = Url::parse(base_url) else {
            log::warn!("Archive base URL '{base_url}' is invalid; no items extracted");
            return Vec::new();
        };

        let item = match selectors::compile(item_selector) {
            Outcome::Success(selector) => selector,
            Outcome::Degraded { value, reason } => {
                log::warn!("{reason}");
                value
            }
            Outcome::Failure(reason) => {
                log::warn!("Archive selector unusable: {reason}");
                return Vec::new();
            }
        };
        let thumbnail = thumbnail_selector.and_then(|s| compile_optional(s, "thumbnail"));

        let document = Html::parse_document(content);
        let mut items = Vec::new();

        for (index, block) in document.select(&item).enumerate() {
            let Some(anchor) = find_anchor(block) else {
                log::warn!("Archive item {} has no link; skipped", index + 1);
                continue;
            };
            let href = anchor.value().attr("href").unwrap_or_default();
            let Some(url) = resolve_url(&base, href) else {
                log::warn!("Archive item {} link '{href}' does not resolve; skipped", index + 1);
                continue;
            };

            items.push(ArchiveItem {
                url,
                title: self.title(block, anchor),
                thumbnail_url: thumbnail
                    .as_ref()
                    .and_then(|selector| self.thumbnail(block, selector, &base)),
            });
        }

        items
    }

    /// Anchor text, unless a scoped title selector (in priority order) offers
    /// a longer text; the first such selector wins.
    fn title<'a>(&self, block: ElementRef<'a>, anchor: ElementRef<'a>) -> String {
        let link_text = element_text(anchor);
        self.title_selectors
            .iter()
            .filter_map(|selector| block.select(selector).next())
            .map(element_text)
            .find(|candidate| candidate.chars().count() > link_text.chars().count())
            .unwrap_or(link_text)
    }

    fn thumbnail(&self, block: ElementRef<'_>, selector: &Selector, base: &Url) -> Option<String> {
        let image = block.select(selector).next()?;
        self.thumbnail_attrs
            .iter()
            .filter_map(|attr| image.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .and_then(|value| resolve_url(base, value))
    }
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

fn compile_optional(selector: &str, role: &str) -> Option<Selector> {
    match selectors::compile(selector) {
        Outcome::Failure(reason) => {
            log::warn!("Ignoring {role} selector: {reason}");
            None
        }
        outcome => outcome.into_value(),
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// The block itself when it is a link, else its first descendant link with a target.
fn find_anchor(block: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let has_target = |el: &ElementRef<'_>| {
        el.value()
            .attr("href")
            .is_some_and(|href| !href.trim().is_empty())
    };

    if block.value().name() == "a" && has_target(&block) {
        return Some(block);
    }
    block.select(&LINK).find(has_target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://x.test/list";

    #[test]
    fn test_block_that_is_an_anchor() {
        let html = r#"<div><a class="item" href="/a">Hi</a></div>"#;
        let items = ArchiveExtractor::default().extract(html, "a.item", None, BASE);
        assert_eq!(
            items,
            vec![ArchiveItem {
                url: "https://x.test/a".into(),
                title: "Hi".into(),
                thumbnail_url: None,
            }]
        );
    }

    #[test]
    fn test_longer_heading_beats_link_text() {
        let html = r#"
            <article>
              <h2>Full headline of the story</h2>
              <a href="story-1">Read more</a>
            </article>
        "#;
        let items = ArchiveExtractor::default().extract(html, "article", None, BASE);
        assert_eq!(items[0].url, "https://x.test/story-1");
        assert_eq!(items[0].title, "Full headline of the story");
    }

    #[test]
    fn test_first_longer_heading_wins_over_later_longest() {
        let html = r#"
            <article>
              <a href="/a">Hi</a>
              <h2>Medium title</h2>
              <h3>Much longer h3 heading text here</h3>
            </article>
        "#;
        let items = ArchiveExtractor::default().extract(html, "article", None, BASE);
        assert_eq!(items[0].title, "Medium title");
    }

    #[test]
    fn test_short_heading_keeps_link_text() {
        let html = r#"<article><h2>News</h2><a href="/a">A longer link text</a></article>"#;
        let items = ArchiveExtractor::default().extract(html, "article", None, BASE);
        assert_eq!(items[0].title, "A longer link text");
    }

    #[test]
    fn test_short_heading_is_passed_over() {
        let html = r#"<article><a href="/a">Link text</a><h2>Tiny</h2><h3>Longer heading</h3></article>"#;
        let items = ArchiveExtractor::default().extract(html, "article", None, BASE);
        assert_eq!(items[0].title, "Longer heading");
    }

    #[test]
    fn test_lazy_thumbnail_is_resolved() {
        let html = r#"
            <article>
              <a href="/a">Story</a>
              <img data-src="/t.jpg">
            </article>
        "#;
        let items = ArchiveExtractor::default().extract(html, "article", Some("img"), BASE);
        assert_eq!(items[0].thumbnail_url.as_deref(), Some("https://x.test/t.jpg"));
    }

    #[test]
    fn test_src_wins_over_lazy_attributes() {
        let html = r#"<article><a href="/a">A</a><img src="/s.jpg" data-src="/d.jpg"></article>"#;
        let items = ArchiveExtractor::default().extract(html, "article", Some("img"), BASE);
        assert_eq!(items[0].thumbnail_url.as_deref(), Some("https://x.test/s.jpg"));
    }

    #[test]
    fn test_linkless_block_is_skipped_not_fatal() {
        let html = r#"
            <article><span>no link here</span></article>
            <article><a href="">empty</a><a href="/b">B</a></article>
            <article><a href="/c">C</a></article>
        "#;
        let items = ArchiveExtractor::default().extract(html, "article", None, BASE);
        let urls: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.test/b", "https://x.test/c"]);
    }

    #[test]
    fn test_duplicates_and_order_are_kept() {
        let html = r#"<li><a href="/b">B</a></li><li><a href="/a">A</a></li><li><a href="/b">B</a></li>"#;
        let items = ArchiveExtractor::default().extract(html, "li", None, BASE);
        let urls: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://x.test/b", "https://x.test/a", "https://x.test/b"]
        );
    }

    #[test]
    fn test_unusable_selector_yields_nothing() {
        let items = ArchiveExtractor::default().extract("<a href='/a'>A</a>", "[[", None, BASE);
        assert!(items.is_empty());
    }
}
