//! Article persistence.
//!
//! Two on-disk representations, chosen once per run and never mixed:
//!
//! ```text
//! data/raw/
//! ├── <slug>.jsonl        # ndjson: one record per line, append-only
//! ├── <slug>.json         # json: one array, rewritten atomically on every save
//! └── <slug>_urls.json    # URL-list handoff between phases
//! ```

mod json_array;
mod ledger;
mod ndjson;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Article;

pub use json_array::JsonArraySink;
pub(crate) use json_array::parse_array;
pub use ledger::ResumeLedger;
pub use ndjson::NdjsonSink;

/// On-disk representation of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Line-delimited JSON records
    #[serde(alias = "jsonl")]
    #[cfg_attr(feature = "cli", value(alias = "jsonl"))]
    Ndjson,
    /// A single JSON array
    Json,
}

impl StorageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ndjson => "jsonl",
            Self::Json => "json",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "jsonl" | "ndjson" => Some(Self::Ndjson),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Summary of an output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub path: PathBuf,
    pub format: StorageFormat,
    pub exists: bool,
    pub size_bytes: u64,
    pub record_count: usize,
}

/// Trait for article storage backends.
#[async_trait]
pub trait ArticleSink: Send + Sync {
    /// Persist one record durably before returning.
    async fn save(&mut self, article: &Article) -> Result<()>;

    /// Ids of all stored records; malformed records are skipped.
    async fn load_ids(&self) -> Result<HashSet<String>>;

    async fn stats(&self) -> Result<StorageStats>;

    fn path(&self) -> &Path;

    fn format(&self) -> StorageFormat;
}

/// Open the sink for `format` at `path`, checking any existing file matches.
pub async fn open_sink(path: &Path, format: StorageFormat) -> Result<Box<dyn ArticleSink>> {
    Ok(match format {
        StorageFormat::Ndjson => Box::new(NdjsonSink::open(path).await?),
        StorageFormat::Json => Box::new(JsonArraySink::open(path).await?),
    })
}

/// Copy the output file to `<file>.backup_<YYYYmmdd_HHMMSS>`.
///
/// Returns `None` when there is nothing to back up.
pub async fn backup(path: &Path) -> Result<Option<PathBuf>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".backup_{stamp}"));
    let target = PathBuf::from(name);

    tokio::fs::copy(path, &target).await?;
    log::info!("Backed up {} to {}", path.display(), target.display());
    Ok(Some(target))
}

/// Ensure parent directory exists.
async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Read a file, returning None if it doesn't exist.
async fn read_existing(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn file_size(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) fn sample_article(url: &str) -> Article {
    let date = chrono::NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    let mut article = Article::partial(url, date);
    article.title = Some("Sample headline".into());
    article.raw_content = Some("<div>ç café 記事</div>".into());
    article
}
