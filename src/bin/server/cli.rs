//! CLI mode for single-image and batch alignment.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Instant;

use oar_kvmap::batch::{BatchJob, BatchRunner};
use oar_kvmap::core::{AlignConfig, ParallelPolicy, ProcessingStage};
use oar_kvmap::domain::AnnotationDocument;
use oar_kvmap::kvmap::{AlignmentResult, TemplateAligner};
use oar_kvmap::utils::{read_json, write_json_pretty};
use serde_json::Value;
use tracing::{info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Inputs of the `align` subcommand
pub struct AlignArgs {
    pub template: PathBuf,
    pub generic: PathBuf,
    pub domain: PathBuf,
    pub image_name: Option<String>,
    pub output: Option<PathBuf>,
    pub format: String,
}

/// Align one image and print or write the result
pub fn process_single(args: &AlignArgs, config: AlignConfig) -> CliResult<()> {
    let start = Instant::now();

    let template: AnnotationDocument = read_json(&args.template, ProcessingStage::TemplateLoad)?;
    let generic: Value = read_json(&args.generic, ProcessingStage::OcrLoad)?;
    let domain: Value = read_json(&args.domain, ProcessingStage::OcrLoad)?;
    info!("Loaded inputs in {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);

    let aligner = TemplateAligner::new(config)?;
    let mut result = aligner.align_payloads(&template, &generic, &domain);
    if let Some(name) = &args.image_name {
        result.document.image = name.clone();
    }

    let rendered = render(&result, &args.format)?;
    match &args.output {
        Some(path) => {
            write_json_pretty(path, &rendered)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&rendered)?),
    }
    Ok(())
}

/// Select the part of the result the user asked for
fn render(result: &AlignmentResult, format: &str) -> CliResult<Value> {
    let value = match format {
        "compact" => result.document.to_compact_json()?,
        "result" => serde_json::to_value(result)?,
        "manual" => serde_json::to_value(&result.matched_manual)?,
        "summary" => serde_json::to_value(&result.stats)?,
        "document" => serde_json::to_value(&result.document)?,
        other => return Err(format!("unknown output format '{other}'").into()),
    };
    Ok(value)
}

/// Inputs of the `batch` subcommand
pub struct BatchArgs {
    pub template: PathBuf,
    pub generic_dir: PathBuf,
    pub domain_dir: PathBuf,
    pub output_dir: PathBuf,
    pub image_dir: Option<PathBuf>,
    pub compact: bool,
    pub workers: Option<usize>,
    pub report: Option<PathBuf>,
}

/// Align every image of a folder; Ctrl+C stops before the next image
pub async fn process_batch(args: BatchArgs, config: AlignConfig) -> CliResult<()> {
    let mut job = BatchJob::new(
        &args.template,
        &args.generic_dir,
        &args.domain_dir,
        &args.output_dir,
    )
    .with_compact(args.compact);
    if let Some(dir) = &args.image_dir {
        job = job.with_image_dir(dir);
    }

    let policy = match args.workers {
        Some(workers) => ParallelPolicy::new()
            .with_max_threads(Some(workers))
            .with_sequential_threshold(0),
        None => ParallelPolicy::sequential(),
    };
    let runner = BatchRunner::new(TemplateAligner::new(config)?).with_policy(policy);

    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping after the current image...");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let report = tokio::task::spawn_blocking(move || runner.run(&job)).await??;

    for entry in report.failures() {
        warn!(
            "{}: {}",
            entry.image,
            entry.error.as_deref().unwrap_or("unknown error")
        );
    }
    info!(
        "Batch done: {} succeeded, {} failed, {} cancelled",
        report.succeeded, report.failed, report.cancelled
    );

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    Ok(())
}

fn write_report(path: &Path, report: &oar_kvmap::batch::BatchReport) -> CliResult<()> {
    write_json_pretty(path, report)?;
    info!("Wrote batch report to {}", path.display());
    Ok(())
}
