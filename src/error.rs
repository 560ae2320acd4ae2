// src/error.rs

//! Unified error handling for the scraper.
//!
//! Only conditions that end a run before or outside the crawl loop become an
//! [`AppError`]. Transport failures and selector misses are reported through
//! [`crate::models::Outcome`] and the run statistics instead.

use std::fmt;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or a request failed outside an engine
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fetch engine could not be constructed
    #[error("Engine '{engine}' unavailable: {message}")]
    EngineUnavailable { engine: String, message: String },

    /// No candidate engine passed the probe for a phase
    #[error("No working scraping engine found for {phase}")]
    NoEngine { phase: String },

    /// Existing output file does not match the configured representation
    #[error("Storage format mismatch for {path}: {message}")]
    StorageFormat { path: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an engine construction error.
    pub fn engine_unavailable(engine: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::EngineUnavailable {
            engine: engine.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a "no working engine" error for the given phase.
    pub fn no_engine(phase: impl fmt::Display) -> Self {
        Self::NoEngine {
            phase: phase.to_string(),
        }
    }

    /// Create a storage format mismatch error.
    pub fn storage_format(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::StorageFormat {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_engine_message_names_phase() {
        let err = AppError::no_engine("detail pages");
        assert_eq!(
            err.to_string(),
            "No working scraping engine found for detail pages"
        );
    }

    #[test]
    fn test_selector_error_display() {
        let err = AppError::selector("[[x", "unexpected token");
        assert_eq!(err.to_string(), "Invalid selector '[[x': unexpected token");
    }
}
