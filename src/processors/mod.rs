//! Matching primitives shared by the alignment stages.
//!
//! This module provides:
//! - Axis-aligned geometry and overlap measures ([`geometry`])
//! - Text similarity rules for KEY and ETC anchoring ([`text_match`])
//! - Row assembly and line splitting of OCR words ([`line_merge`])

pub mod geometry;
pub mod line_merge;
pub mod text_match;

pub use geometry::{BoundingBox, Point};
pub use line_merge::{LineGroup, LineMerger};
pub use text_match::TextMatcher;
