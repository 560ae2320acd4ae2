// src/services/selectors.rs

//! Selector compilation and element lookup.
//!
//! Operator selectors are CSS. Strings that look like XPath are still tried as
//! CSS and reported as degraded, since a structural match is best-effort there.

use scraper::{Html, Selector};

use crate::error::AppError;
use crate::models::Outcome;

/// Substrings that mark a selector as XPath-style.
const STRUCTURAL_MARKERS: [&str; 6] = [
    "/",
    "text()",
    "contains(",
    "following-sibling",
    "preceding-sibling",
    "@",
];

/// Whether `selector` reads like an XPath expression rather than CSS.
pub fn looks_structural(selector: &str) -> bool {
    STRUCTURAL_MARKERS
        .iter()
        .any(|marker| selector.contains(marker))
}

/// Parse a selector string.
pub fn parse(selector: &str) -> Result<Selector, AppError> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, e))
}

/// Compile a selector, tagging XPath-looking input as degraded.
pub fn compile(selector: &str) -> Outcome<Selector> {
    match parse(selector) {
        Ok(compiled) if looks_structural(selector) => Outcome::degraded(
            compiled,
            format!("'{selector}' looks like XPath; matched as CSS"),
        ),
        Ok(compiled) => Outcome::Success(compiled),
        Err(e) => Outcome::failure(e.to_string()),
    }
}

/// Outer markup of every element in `content` matching `selector`.
///
/// Never fails: an unparseable selector yields a degraded empty list.
pub fn locate(content: &str, selector: &str) -> Outcome<Vec<String>> {
    if content.trim().is_empty() {
        return Outcome::Success(Vec::new());
    }

    let compiled = match compile(selector) {
        Outcome::Success(compiled) => compiled,
        Outcome::Degraded { value, reason } => {
            let document = Html::parse_document(content);
            let found = collect(&document, &value);
            return Outcome::degraded(found, reason);
        }
        Outcome::Failure(reason) => {
            log::warn!("Selector lookup failed: {reason}");
            return Outcome::degraded(Vec::new(), reason);
        }
    };

    let document = Html::parse_document(content);
    Outcome::Success(collect(&document, &compiled))
}

fn collect(document: &Html, selector: &Selector) -> Vec<String> {
    document.select(selector).map(|el| el.html()).collect()
}
