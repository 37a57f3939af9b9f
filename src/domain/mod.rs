//! Domain types for templates and OCR words.
//!
//! - [`annotation`]: the template / result schema (`AnnotationDocument`)
//! - [`words`]: canonical OCR words and the payload normalizer

pub mod annotation;
pub mod words;

pub use annotation::{Annotation, AnnotationDocument, AnnotationId, AnnotationKind};
pub use words::{ImageSize, NormalizedOcr, OcrFormat, Word, WordNormalizer};
