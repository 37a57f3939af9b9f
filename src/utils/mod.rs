//! Utility functions shared by the library and its front ends.
//!
//! This module provides logging setup and JSON file helpers that attach the
//! failing [`ProcessingStage`] to I/O and parse errors.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::errors::{KvMapError, KvMapResult, ProcessingStage};

/// Initializes the tracing subscriber for logging.
///
/// The filter is read from `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Reads and decodes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path, stage: ProcessingStage) -> KvMapResult<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| KvMapError::processing(stage, format!("reading {}", path.display()), e))?;
    serde_json::from_str(&raw)
        .map_err(|e| KvMapError::processing(stage, format!("parsing {}", path.display()), e))
}

/// Writes `value` as pretty-printed JSON, creating parent directories.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> KvMapResult<()> {
    let write = || -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut body = serde_json::to_string_pretty(value)?;
        body.push('\n');
        fs::write(path, body)
    };
    write().map_err(|e| {
        KvMapError::processing(
            ProcessingStage::OutputWrite,
            format!("writing {}", path.display()),
            e,
        )
    })
}
