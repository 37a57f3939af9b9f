//! Configuration types for the alignment server and CLI.

use std::path::PathBuf;

use clap::Args;
use oar_kvmap::core::{AlignConfig, ConfigValidator, KvMapResult};

/// Alignment tuning shared by every subcommand.
///
/// Flags override values read from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// JSON file with `AlignConfig` fields (missing fields use defaults)
    #[arg(long, env = "OAR_KV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Radius of the stage-2 KEY micro-snap, in pixels
    #[arg(long = "key-snap-radius", env = "OAR_KV_KEY_SNAP_RADIUS")]
    pub key_snap_radius: Option<f32>,

    /// Enable the stage-1 IoU fallback with this minimum IoU
    #[arg(long = "key-iou-fallback", env = "OAR_KV_KEY_IOU_FALLBACK")]
    pub key_iou_fallback: Option<f32>,

    /// Compare KEY text case-sensitively
    #[arg(long = "case-sensitive-keys", env = "OAR_KV_CASE_SENSITIVE_KEYS")]
    pub case_sensitive_keys: bool,
}

impl TuningArgs {
    /// Resolves the effective configuration.
    pub fn resolve(&self) -> KvMapResult<AlignConfig> {
        let mut config = match &self.config {
            Some(path) => AlignConfig::from_json_file(path)?,
            None => AlignConfig::default(),
        };
        if let Some(radius) = self.key_snap_radius {
            config = config.with_key_snap_radius(radius);
        }
        if self.key_iou_fallback.is_some() {
            config = config.with_key_iou_fallback(self.key_iou_fallback);
        }
        if self.case_sensitive_keys {
            config = config.with_case_sensitive_keys(true);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the HTTP server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub align: AlignConfig,
    pub host: String,
    pub port: u16,
}
