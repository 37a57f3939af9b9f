//! Per-image outcomes of a batch run.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::errors::KvMapError;

/// Outcome of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Succeeded,
    Failed,
    /// Not started because the run was cancelled.
    Cancelled,
}

/// One line of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub image: String,
    pub status: EntryStatus,
    /// Error with its cause chain, for failed entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Written output document, for succeeded entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub keys_matched: usize,
    pub value_lines: usize,
    pub elapsed_ms: f64,
}

impl BatchEntry {
    pub(crate) fn failed(image: &str, error: &KvMapError, elapsed_ms: f64) -> Self {
        let status = match error {
            KvMapError::Cancelled => EntryStatus::Cancelled,
            _ => EntryStatus::Failed,
        };
        Self {
            image: image.to_string(),
            status,
            error: (status == EntryStatus::Failed).then(|| error.report()),
            output: None,
            keys_matched: 0,
            value_lines: 0,
            elapsed_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EntryStatus::Succeeded
    }
}

/// Summary of a batch run, entries in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Entries that were started (succeeded or failed).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn from_entries(entries: Vec<BatchEntry>) -> Self {
        let mut report = Self::default();
        for entry in &entries {
            match entry.status {
                EntryStatus::Succeeded => report.succeeded += 1,
                EntryStatus::Failed => report.failed += 1,
                EntryStatus::Cancelled => report.cancelled += 1,
            }
        }
        report.processed = report.succeeded + report.failed;
        report.entries = entries;
        report
    }

    /// Entries that failed, with their error text.
    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_statuses() {
        let ok = BatchEntry {
            image: "a.jpg".into(),
            status: EntryStatus::Succeeded,
            error: None,
            output: Some(PathBuf::from("out/a.json")),
            keys_matched: 3,
            value_lines: 4,
            elapsed_ms: 1.0,
        };
        let failed = BatchEntry::failed("b.jpg", &KvMapError::missing_counterpart("b.jpg", "domain OCR"), 0.5);
        let cancelled = BatchEntry::failed("c.jpg", &KvMapError::Cancelled, 0.0);

        let report = BatchReport::from_entries(vec![ok, failed, cancelled]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.entries[2].error, None);
        let failures: Vec<_> = report.failures().map(|e| e.image.as_str()).collect();
        assert_eq!(failures, vec!["b.jpg"]);
        assert!(report.entries[1].error.as_deref().unwrap().contains("domain OCR"));
    }
}
