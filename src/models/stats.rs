// src/models/stats.rs

//! Run-scoped statistics and the final run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Archive pages that yielded at least one item
    pub pages_processed: usize,
    /// Archive items found across all pages (before de-duplication)
    pub items_found: usize,
    /// Articles that went through fetch/extract
    pub processed: usize,
    /// Articles written to the sink
    pub saved: usize,
    /// Already-stored articles plus content-selector misses
    pub skipped: usize,
    /// Failed archive pages, failed fetches and failed writes
    pub errors: usize,
}

impl CrawlStats {
    /// Rows for [`crate::utils::log::summary`].
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Archive pages processed", self.pages_processed.to_string()),
            ("Archive items found", self.items_found.to_string()),
            ("Articles processed", self.processed.to_string()),
            ("Articles saved", self.saved.to_string()),
            ("Articles skipped", self.skipped.to_string()),
            ("Errors", self.errors.to_string()),
        ]
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed(String),
    Interrupted,
}

/// Final result of a run; statistics are present on every path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub stats: CrawlStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Process exit code: 0 completed, 1 failed, 130 interrupted.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Completed => 0,
            RunStatus::Failed(_) => 1,
            RunStatus::Interrupted => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: RunStatus) -> RunReport {
        RunReport {
            status,
            stats: CrawlStats::default(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_eq!(report(RunStatus::Completed).exit_code(), 0);
        assert_eq!(report(RunStatus::Failed("x".into())).exit_code(), 1);
        assert_eq!(report(RunStatus::Interrupted).exit_code(), 130);
    }

    #[test]
    fn test_report_serializes_status_tag() {
        let value = serde_json::to_value(report(RunStatus::Failed("boom".into()))).unwrap();
        assert_eq!(value["status"]["failed"], "boom");
        assert_eq!(value["stats"]["saved"], 0);

        let value = serde_json::to_value(report(RunStatus::Completed)).unwrap();
        assert_eq!(value["status"], "completed");
    }
}
