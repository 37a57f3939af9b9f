//! Configuration management for the alignment pipeline.
//!
//! This module provides the tunable thresholds of the pipeline, the batch
//! parallelism policy, and the validation trait they share.

pub mod align;
pub mod errors;
pub mod parallel;

// Re-export commonly used types
pub use align::AlignConfig;
pub use errors::{ConfigError, ConfigValidator};
pub use parallel::ParallelPolicy;
