//! Batch execution over paired OCR folders.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde_json::Value;

use super::job::{BatchItem, BatchJob};
use super::report::{BatchEntry, BatchReport, EntryStatus};
use crate::core::config::ParallelPolicy;
use crate::core::errors::{KvMapError, KvMapResult, ProcessingStage};
use crate::domain::annotation::AnnotationDocument;
use crate::kvmap::TemplateAligner;
use crate::utils::{read_json, write_json_pretty};

/// Runs a [`BatchJob`] image by image.
///
/// Runs are sequential unless a [`ParallelPolicy`] allowing threads is set.
/// The cancellation flag is checked before each image starts; an image in
/// progress always finishes. Items that never started are reported as
/// cancelled.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    aligner: TemplateAligner,
    policy: ParallelPolicy,
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(aligner: TemplateAligner) -> Self {
        Self {
            aligner,
            policy: ParallelPolicy::sequential(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_policy(mut self, policy: ParallelPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shares an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels the run when set to `true`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Runs the job.
    ///
    /// Only a missing template or an unreadable input folder fails the whole
    /// run; per-image problems become error entries.
    pub fn run(&self, job: &BatchJob) -> KvMapResult<BatchReport> {
        let start = Instant::now();
        let template: AnnotationDocument = read_json(&job.template, ProcessingStage::TemplateLoad)?;
        let items = job.items()?;
        tracing::info!(images = items.len(), template = %job.template.display(), "starting batch");

        let entries: Vec<BatchEntry> = if self.policy.should_parallelize(items.len()) {
            let pool = self.policy.build_thread_pool().map_err(|e| {
                KvMapError::processing(
                    ProcessingStage::BatchProcessing,
                    "building thread pool",
                    e,
                )
            })?;
            pool.install(|| {
                items
                    .par_iter()
                    .map(|item| self.process(&template, item, job.compact))
                    .collect()
            })
        } else {
            items
                .iter()
                .map(|item| self.process(&template, item, job.compact))
                .collect()
        };

        let report = BatchReport::from_entries(entries);
        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "batch finished"
        );
        Ok(report)
    }

    fn process(&self, template: &AnnotationDocument, item: &BatchItem, compact: bool) -> BatchEntry {
        let start = Instant::now();
        match self.align_item(template, item, compact) {
            Ok((keys_matched, value_lines)) => BatchEntry {
                image: item.image.clone(),
                status: EntryStatus::Succeeded,
                error: None,
                output: Some(item.output.clone()),
                keys_matched,
                value_lines,
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            },
            Err(err) => {
                if !matches!(err, KvMapError::Cancelled) {
                    tracing::warn!(image = %item.image, error = %err.report(), "image failed");
                }
                BatchEntry::failed(&item.image, &err, start.elapsed().as_secs_f64() * 1000.0)
            }
        }
    }

    fn align_item(
        &self,
        template: &AnnotationDocument,
        item: &BatchItem,
        compact: bool,
    ) -> KvMapResult<(usize, usize)> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(KvMapError::Cancelled);
        }
        item.check_counterparts()?;
        let generic: Value = read_json(&item.generic, ProcessingStage::OcrLoad)?;
        let domain: Value = read_json(&item.domain, ProcessingStage::OcrLoad)?;

        let mut result = self.aligner.align_payloads(template, &generic, &domain);
        result.document.image = item.image.clone();

        if compact {
            write_json_pretty(&item.output, &result.document.to_compact_json()?)?;
        } else {
            write_json_pretty(&item.output, &result.document)?;
        }
        Ok((result.stats.keys_matched(), result.stats.value_lines))
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(TemplateAligner::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, value: &Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    fn fixture(root: &Path) -> BatchJob {
        write(
            &root.join("template.json"),
            &json!({
                "image": "tpl.jpg",
                "annotations": [
                    {"id": 1, "type": "key", "bbox": [10, 10, 60, 30], "text": "Class"},
                    {"id": 2, "type": "value", "bbox": [70, 10, 200, 30], "key_id": 1}
                ]
            }),
        );
        for stem in ["a", "b", "c"] {
            write(
                &root.join("generic").join(format!("{stem}.json")),
                &json!([{"text": "Class", "bbox": [110, 20, 160, 40]}]),
            );
        }
        write(
            &root.join("domain").join("a.json"),
            &json!([{"text": "8", "bbox": [180, 20, 200, 40]}]),
        );
        fs::write(root.join("domain").join("b.json"), "{broken").unwrap();
        BatchJob::new(
            root.join("template.json"),
            root.join("generic"),
            root.join("domain"),
            root.join("out"),
        )
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let root = tempfile::tempdir().unwrap();
        let job = fixture(root.path());
        let report = BatchRunner::default().run(&job).unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);

        let a = &report.entries[0];
        assert!(a.is_success());
        assert_eq!(a.keys_matched, 1);
        assert_eq!(a.value_lines, 1);

        let b = &report.entries[1];
        assert!(b.error.as_deref().unwrap().contains("b.json"));
        let c = &report.entries[2];
        assert!(c.error.as_deref().unwrap().contains("domain OCR"));

        let written: Value =
            serde_json::from_str(&fs::read_to_string(root.path().join("out/a.json")).unwrap())
                .unwrap();
        assert_eq!(written["image"], json!("a"));
        assert_eq!(written["annotations"][1]["text"], json!("8"));
        assert!(!root.path().join("out/b.json").exists());
    }

    #[test]
    fn test_cancelled_run_starts_nothing() {
        let root = tempfile::tempdir().unwrap();
        let job = fixture(root.path());
        let runner = BatchRunner::default();
        runner.cancel();
        let report = runner.run(&job).unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.cancelled, 3);
        assert!(!root.path().join("out").exists());
    }

    #[test]
    fn test_parallel_run_keeps_input_order() {
        let root = tempfile::tempdir().unwrap();
        let job = fixture(root.path()).with_compact(true);
        let policy = ParallelPolicy::new()
            .with_sequential_threshold(0)
            .with_max_threads(Some(2));
        let report = BatchRunner::default().with_policy(policy).run(&job).unwrap();

        let images: Vec<&str> = report.entries.iter().map(|e| e.image.as_str()).collect();
        assert_eq!(images, vec!["a", "b", "c"]);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(root.path().join("out/a.json")).unwrap())
                .unwrap();
        assert!(written["annotations"][0].get("id").is_none());
    }

    #[test]
    fn test_missing_template_fails_the_run() {
        let root = tempfile::tempdir().unwrap();
        let job = BatchJob::new(
            root.path().join("missing.json"),
            root.path(),
            root.path(),
            root.path().join("out"),
        );
        let err = BatchRunner::default().run(&job).unwrap_err();
        assert!(matches!(
            err,
            KvMapError::Processing {
                kind: ProcessingStage::TemplateLoad,
                ..
            }
        ));
    }
}
