//! The core module of the alignment engine.
//!
//! This module contains the pieces every other layer depends on:
//! - Configuration management ([`config`])
//! - Error handling ([`errors`])

pub mod config;
pub mod errors;

pub use config::{AlignConfig, ConfigError, ConfigValidator, ParallelPolicy};
pub use errors::{KvMapError, KvMapResult, ProcessingStage};
