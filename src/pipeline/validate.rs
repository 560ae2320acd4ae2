// src/pipeline/validate.rs

//! Structural validation of an output file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::storage::{StorageFormat, parse_array};
use crate::utils::log;

/// Fields every stored record must carry; one of the date fields is enough.
const REQUIRED_FIELDS: [&str; 2] = ["id", "url"];
const DATE_FIELDS: [&str; 2] = ["scraped_date", "scraped_at"];

/// Result of validating one output file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub path: PathBuf,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.invalid == 0 && self.errors.is_empty()
    }

    fn check(&mut self, location: String, record: &Value) {
        self.total += 1;
        match missing_field(record) {
            None => self.valid += 1,
            Some(field) => {
                self.invalid += 1;
                self.errors.push(format!("{location}: missing '{field}'"));
            }
        }
    }
}

fn missing_field(record: &Value) -> Option<&'static str> {
    let Some(object) = record.as_object() else {
        return Some("object");
    };
    if let Some(field) = REQUIRED_FIELDS
        .iter()
        .find(|field| !object.contains_key(**field))
    {
        return Some(*field);
    }
    if !DATE_FIELDS.iter().any(|field| object.contains_key(*field)) {
        return Some("scraped_date");
    }
    None
}

/// Count valid and invalid records in `path`.
pub async fn validate_output(path: &Path, format: StorageFormat) -> Result<ValidationReport> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::validation(format!(
                "output file {} does not exist",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mut report = ValidationReport {
        path: path.to_path_buf(),
        ..ValidationReport::default()
    };

    match format {
        StorageFormat::Ndjson => {
            for (index, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(record) => report.check(format!("line {}", index + 1), &record),
                    Err(e) => {
                        report.total += 1;
                        report.invalid += 1;
                        report
                            .errors
                            .push(format!("line {}: JSON decode error: {e}", index + 1));
                    }
                }
            }
        }
        StorageFormat::Json => match parse_array(&content) {
            Ok(records) => {
                for (index, record) in records.iter().enumerate() {
                    report.check(format!("record {}", index + 1), record);
                }
            }
            Err(message) => report.errors.push(message),
        },
    }

    Ok(report)
}

/// Log a validation report in the summary format.
pub fn log_report(report: &ValidationReport) {
    log::summary(
        &format!("Validation of {}", report.path.display()),
        &[
            ("Total records", report.total.to_string()),
            ("Valid", report.valid.to_string()),
            ("Invalid", report.invalid.to_string()),
        ],
    );
    for error in report.errors.iter().take(20) {
        log::sub_item(error);
    }
    if report.errors.len() > 20 {
        log::sub_item(&format!("... and {} more", report.errors.len() - 20));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_line_delimited_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"id\":\"a\",\"url\":\"u\",\"scraped_date\":\"2026-10-16\"}\n",
                "{\"id\":\"b\",\"url\":\"u\",\"scraped_at\":\"2026-10-16T00:00:00Z\"}\n",
                "\n",
                "{\"id\":\"c\",\"url\":\"u\"}\n",
                "{broken\n",
            ),
        )
        .unwrap();

        let report = validate_output(&path, StorageFormat::Ndjson).await.unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.valid, 2);
        assert_eq!(report.invalid, 2);
        assert!(report.errors[0].starts_with("line 4"));
        assert!(report.errors[1].contains("JSON decode error"));
        assert!(!report.is_valid());
    }

    #[tokio::test]
    async fn test_array_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.json");
        std::fs::write(
            &path,
            r#"[{"id":"a","url":"u","scraped_date":"2026-10-16"}, {"url":"u"}, 3]"#,
        )
        .unwrap();

        let report = validate_output(&path, StorageFormat::Json).await.unwrap();
        assert_eq!((report.total, report.valid, report.invalid), (3, 1, 2));

        std::fs::write(&path, r#"{"id":"a"}"#).unwrap();
        let report = validate_output(&path, StorageFormat::Json).await.unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.errors, vec!["root is not a JSON array".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = validate_output(&tmp.path().join("none.jsonl"), StorageFormat::Ndjson)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
