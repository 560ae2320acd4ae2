// src/models/article.rs

//! Archive stubs and article records.

use chrono::NaiveDate;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::utils::source_url;

/// Stable identifier for an article URL.
///
/// Hex MD5 of the URL string, so records written by earlier runs (and by
/// other tools reading the same corpus) keep matching.
pub fn article_id(url: &str) -> String {
    hex::encode(Md5::digest(url.as_bytes()))
}

/// One article stub found on an archive page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveItem {
    /// Absolute article URL
    pub url: String,

    /// Best-effort title from the archive listing
    pub title: String,

    /// Absolute thumbnail URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A stored article record.
///
/// Field names follow the on-disk record schema consumed by the cleaning stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// `article_id(url)`
    pub id: String,

    /// Page title, if any candidate qualified
    pub title: Option<String>,

    /// Article URL as collected
    pub url: String,

    /// Thumbnail carried over from the archive item
    pub thumbnail_url: Option<String>,

    /// Verbatim markup of the matched content node
    #[serde(rename = "raw_html_content")]
    pub raw_content: Option<String>,

    /// Extraction date (no time of day)
    pub scraped_date: NaiveDate,

    /// Scheme and host of `url`
    pub source_url: String,
}

impl Article {
    /// Build the minimal record for `url`: identity fields set, content fields empty.
    pub fn partial(url: &str, scraped_date: NaiveDate) -> Self {
        Self {
            id: article_id(url),
            title: None,
            url: url.to_string(),
            thumbnail_url: None,
            raw_content: None,
            scraped_date,
            source_url: source_url(url).unwrap_or_default(),
        }
    }

    /// Attach the archive thumbnail if one was found.
    pub fn with_thumbnail(mut self, thumbnail_url: Option<String>) -> Self {
        if thumbnail_url.is_some() {
            self.thumbnail_url = thumbnail_url;
        }
        self
    }
}
