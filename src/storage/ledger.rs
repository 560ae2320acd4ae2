// src/storage/ledger.rs

//! Resume ledger.

use std::collections::HashSet;

use crate::error::Result;
use crate::storage::ArticleSink;

/// Ids already persisted. Seeded from the sink, then grown in memory only.
#[derive(Debug, Clone, Default)]
pub struct ResumeLedger {
    ids: HashSet<String>,
}

impl ResumeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every id currently stored in `sink`.
    pub async fn from_sink(sink: &dyn ArticleSink) -> Result<Self> {
        let ids = sink.load_ids().await?;
        log::info!(
            "Resume: {} articles already stored in {}",
            ids.len(),
            sink.path().display()
        );
        Ok(Self { ids })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record a stored id; returns `false` if it was already known.
    pub fn record(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::article_id;
    use crate::storage::{NdjsonSink, sample_article};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seeded_from_sink_then_grows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.jsonl");
        let mut sink = NdjsonSink::open(&path).await.unwrap();
        sink.save(&sample_article("https://x.test/1")).await.unwrap();

        let mut ledger = ResumeLedger::from_sink(&sink).await.unwrap();
        assert!(ledger.contains(&article_id("https://x.test/1")));

        assert!(ledger.record(article_id("https://x.test/2")));
        assert!(!ledger.record(article_id("https://x.test/2")));
        assert!(ledger.contains(&article_id("https://x.test/2")));
        assert!(!ledger.contains(&article_id("https://x.test/3")));
    }
}
