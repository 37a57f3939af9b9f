//! # OAR KV-Map
//!
//! Propagates a hand-annotated key/value template onto new document images.
//! Given the template and two OCR word lists for a target image (a generic
//! OCR and a domain OCR tuned for field values), the aligner relocates every
//! KEY, VALUE and ETC annotation and re-reads VALUE text from the domain OCR.
//!
//! ## Features
//!
//! - Auto-detection of common OCR JSON shapes (four-point domain output,
//!   `{bbox, text}` lists, parallel `rec_texts` arrays, labelme)
//! - Staged KEY anchoring: text match, VALUE-anchored fallback, geometric refinement
//! - Line-aware VALUE re-reading, one output record per physical line
//! - Explicit `matched` provenance: nothing is ever placed on a guessed box
//! - Batch processing over folders with cooperative cancellation
//!
//! ## Modules
//!
//! * [`core`] - Configuration and error handling
//! * [`domain`] - Annotation schema and OCR word normalization
//! * [`processors`] - Geometry, text matching and line merging
//! * [`kvmap`] - The alignment pipeline
//! * [`batch`] - Folder-level batch runs
//! * [`utils`] - Logging setup and JSON file helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oar_kvmap::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template: AnnotationDocument = read_json(Path::new("template.json"), ProcessingStage::TemplateLoad)?;
//! let generic = read_json(Path::new("generic/0001.json"), ProcessingStage::OcrLoad)?;
//! let domain = read_json(Path::new("domain/0001.json"), ProcessingStage::OcrLoad)?;
//!
//! let aligner = TemplateAligner::new(AlignConfig::default())?;
//! let result = aligner.align_payloads(&template, &generic, &domain);
//! println!("{}", result.document.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod core;
pub mod domain;
pub mod kvmap;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use oar_kvmap::prelude::*;
/// ```
///
/// Included items cover the common path:
/// - Configuration (`AlignConfig`, `ParallelPolicy`)
/// - Schema and words (`AnnotationDocument`, `Annotation`, `Word`, `WordNormalizer`)
/// - Alignment (`TemplateAligner`, `AlignmentResult`)
/// - Batch runs (`BatchJob`, `BatchReport`)
/// - Errors (`KvMapError`, `KvMapResult`, `ProcessingStage`)
pub mod prelude {
    pub use crate::batch::{BatchEntry, BatchJob, BatchReport};
    pub use crate::core::{
        AlignConfig, ConfigValidator, KvMapError, KvMapResult, ParallelPolicy, ProcessingStage,
    };
    pub use crate::domain::{
        Annotation, AnnotationDocument, AnnotationId, AnnotationKind, Word, WordNormalizer,
    };
    pub use crate::kvmap::{AlignmentResult, AlignmentStats, MatchStage, TemplateAligner, align};
    pub use crate::processors::BoundingBox;
    pub use crate::utils::{init_tracing, read_json, write_json_pretty};
}
