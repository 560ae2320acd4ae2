// src/models/url_list.rs

//! URL-list handoff file between the archive and detail phases.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Collected article URLs, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlList {
    pub archive_url: String,
    pub archive_selector: String,
    pub content_selector: String,
    pub total_urls: usize,
    pub urls: Vec<String>,
}

impl UrlList {
    pub fn new(
        archive_url: impl Into<String>,
        archive_selector: impl Into<String>,
        content_selector: impl Into<String>,
        urls: Vec<String>,
    ) -> Self {
        Self {
            archive_url: archive_url.into(),
            archive_selector: archive_selector.into(),
            content_selector: content_selector.into(),
            total_urls: urls.len(),
            urls,
        }
    }

    /// Read a handoff file written by an earlier run.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::config(format!("URLs file {} unreadable: {e}", path.display()))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the handoff file, replacing any previous one.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load_preserves_order_and_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site_urls.json");
        let list = UrlList::new(
            "https://x.test/news",
            "article a",
            ".entry",
            vec!["https://x.test/b".into(), "https://x.test/a".into()],
        );
        list.save(&path).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["total_urls"], 2);
        assert_eq!(raw["archive_selector"], "article a");

        let loaded = UrlList::load(&path).await.unwrap();
        assert_eq!(loaded.urls, vec!["https://x.test/b", "https://x.test/a"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let err = UrlList::load(&tmp.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
