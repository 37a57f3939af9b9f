//! Template alignment pipeline.
//!
//! This module turns a hand-annotated template plus two OCR word lists for a
//! new image into relocated annotations. It includes:
//!
//! - [`context`]: per-run working state (moved boxes, deltas, stage bookkeeping)
//! - [`stages`]: candidate preparation and the three KEY stages, plus ETC placement
//! - [`assembler`]: the auto-mapping result and the matched-manual view
//! - [`result`]: output types and run statistics
//! - [`aligner`]: the configured entry point
//!
//! The pipeline is pure and synchronous. It never fails on OCR content:
//! annotations without evidence are tagged unmatched instead.

pub mod aligner;
pub mod assembler;
pub mod context;
pub mod result;
pub mod stages;

pub use aligner::{align, TemplateAligner};
pub use context::{AlignmentContext, EtcMatchMethod, MatchStage};
pub use result::{AlignmentResult, AlignmentStats, CandidateSet, RelocatedAnnotation};
