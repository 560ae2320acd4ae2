// src/storage/ndjson.rs

//! Append-only line-delimited sink.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Article;
use crate::storage::{
    ArticleSink, StorageFormat, StorageStats, ensure_parent, file_size, read_existing,
};

/// One compact JSON record per line; earlier lines are never rewritten.
pub struct NdjsonSink {
    path: PathBuf,
    file: File,
}

impl NdjsonSink {
    /// Open for appending. An existing file holding a JSON array is rejected.
    ///
    /// A torn last line (no trailing newline) is terminated first so the next
    /// record starts on a line of its own.
    pub async fn open(path: &Path) -> Result<Self> {
        ensure_parent(path).await?;
        let mut torn = false;
        if let Some(content) = read_existing(path).await? {
            if content.trim_start().starts_with('[') {
                return Err(AppError::storage_format(
                    path.display(),
                    "file holds a JSON array but line-delimited output was requested",
                ));
            }
            torn = !content.is_empty() && !content.ends_with('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        if torn {
            log::warn!("{} ends with a partial record; terminating it", path.display());
            file.write_all(b"\n").await?;
            file.flush().await?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

/// Ids from line-delimited content, skipping blank and malformed lines.
pub(crate) fn ids_from_lines(content: &str, path: &Path) -> HashSet<String> {
    let mut ids = HashSet::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|value| value.get("id")?.as_str().map(String::from));
        match id {
            Some(id) => {
                ids.insert(id);
            }
            None => log::warn!(
                "Skipping malformed record at {}:{}",
                path.display(),
                index + 1
            ),
        }
    }
    ids
}

#[async_trait]
impl ArticleSink for NdjsonSink {
    async fn save(&mut self, article: &Article) -> Result<()> {
        let mut line = serde_json::to_string(article)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }

    async fn load_ids(&self) -> Result<HashSet<String>> {
        let content = read_existing(&self.path).await?.unwrap_or_default();
        Ok(ids_from_lines(&content, &self.path))
    }

    async fn stats(&self) -> Result<StorageStats> {
        let content = read_existing(&self.path).await?;
        Ok(StorageStats {
            path: self.path.clone(),
            format: StorageFormat::Ndjson,
            exists: content.is_some(),
            size_bytes: file_size(&self.path).await?,
            record_count: content
                .as_deref()
                .map(|c| c.lines().filter(|l| !l.trim().is_empty()).count())
                .unwrap_or(0),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> StorageFormat {
        StorageFormat::Ndjson
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::article_id;
    use crate::storage::sample_article;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_reload_ids_skipping_malformed_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("site.jsonl");

        let mut sink = NdjsonSink::open(&path).await.unwrap();
        sink.save(&sample_article("https://x.test/1")).await.unwrap();
        sink.save(&sample_article("https://x.test/2")).await.unwrap();
        drop(sink);

        // interleave garbage between valid records
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("not json\n\n{\"title\":\"no id\"}\n");
        std::fs::write(&path, content).unwrap();

        let mut sink = NdjsonSink::open(&path).await.unwrap();
        sink.save(&sample_article("https://x.test/3")).await.unwrap();

        let ids = sink.load_ids().await.unwrap();
        let expected: HashSet<String> = ["https://x.test/1", "https://x.test/2", "https://x.test/3"]
            .into_iter()
            .map(article_id)
            .collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_record_after_torn_line_starts_fresh() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.jsonl");

        let mut sink = NdjsonSink::open(&path).await.unwrap();
        sink.save(&sample_article("https://x.test/1")).await.unwrap();
        drop(sink);

        // crash mid-append: partial record, no newline
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"id\":\"torn");
        std::fs::write(&path, content).unwrap();

        let mut sink = NdjsonSink::open(&path).await.unwrap();
        sink.save(&sample_article("https://x.test/2")).await.unwrap();

        let ids = sink.load_ids().await.unwrap();
        assert!(ids.contains(&article_id("https://x.test/1")));
        assert!(ids.contains(&article_id("https://x.test/2")));
        assert_eq!(ids.len(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_records_are_compact_and_keep_unicode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.jsonl");
        let mut sink = NdjsonSink::open(&path).await.unwrap();
        sink.save(&sample_article("https://x.test/1")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("記事"));
        assert!(content.contains("\"raw_html_content\""));

        let stats = sink.stats().await.unwrap();
        assert!(stats.exists);
        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.size_bytes, content.len() as u64);
    }

    #[tokio::test]
    async fn test_array_file_is_a_format_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.jsonl");
        std::fs::write(&path, "[\n  {\"id\": \"a\"}\n]").unwrap();

        let err = NdjsonSink::open(&path).await.err().unwrap();
        assert!(matches!(err, AppError::StorageFormat { .. }));
    }
}
