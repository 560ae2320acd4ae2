// src/storage/json_array.rs

//! Whole-array sink.
//!
//! Every save rewrites the complete file. The rewrite goes to a sibling temp
//! file that is renamed over the target, so readers only ever see a complete
//! array.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Article;
use crate::storage::{
    ArticleSink, StorageFormat, StorageStats, ensure_parent, file_size, read_existing,
};

/// All records held in memory and written as one pretty-printed array.
pub struct JsonArraySink {
    path: PathBuf,
    records: Vec<Value>,
}

impl JsonArraySink {
    /// Load existing records. Content that is not a JSON array is rejected.
    pub async fn open(path: &Path) -> Result<Self> {
        ensure_parent(path).await?;
        let records = match read_existing(path).await? {
            Some(content) if !content.trim().is_empty() => parse_array(&content)
                .map_err(|message| AppError::storage_format(path.display(), message))?,
            _ => Vec::new(),
        };

        if !records.is_empty() {
            log::info!("Loaded {} existing records from {}", records.len(), path.display());
        }
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

pub(crate) fn parse_array(content: &str) -> std::result::Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(_) => Err("root is not a JSON array".into()),
        Err(e) => Err(format!("not a JSON document: {e}")),
    }
}

#[async_trait]
impl ArticleSink for JsonArraySink {
    async fn save(&mut self, article: &Article) -> Result<()> {
        self.records.push(serde_json::to_value(article)?);
        let bytes = serde_json::to_vec_pretty(&self.records)?;
        if let Err(e) = self.write_bytes(&bytes).await {
            // keep memory consistent with the file on disk
            self.records.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn load_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for (index, record) in self.records.iter().enumerate() {
            match record.get("id").and_then(Value::as_str) {
                Some(id) => {
                    ids.insert(id.to_string());
                }
                None => log::warn!(
                    "Skipping malformed record #{} in {}",
                    index + 1,
                    self.path.display()
                ),
            }
        }
        Ok(ids)
    }

    async fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            path: self.path.clone(),
            format: StorageFormat::Json,
            exists: tokio::fs::try_exists(&self.path).await?,
            size_bytes: file_size(&self.path).await?,
            record_count: self.records.len(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> StorageFormat {
        StorageFormat::Json
    }
}
