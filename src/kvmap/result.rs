//! Output types of an alignment run.

use serde::Serialize;

use crate::domain::annotation::{Annotation, AnnotationDocument};
use crate::domain::words::Word;
use crate::kvmap::context::MatchStage;
use crate::processors::geometry::BoundingBox;

/// Stage-0 candidate sets, kept for visualisation and debugging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateSet {
    /// Domain OCR words merged into space-separated spans.
    pub value_spans: Vec<Word>,
    /// Generic OCR words not covered by any value span.
    pub key_words: Vec<Word>,
}

/// A template annotation at its final position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelocatedAnnotation {
    #[serde(flatten)]
    pub annotation: Annotation,
    /// Box as authored in the template.
    pub moved_from: BoundingBox,
    /// Cumulative translation applied over all stages.
    pub delta: [f32; 2],
    /// Stage the owning KEY was anchored in; absent for ETC entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<MatchStage>,
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentStats {
    pub generic_words: usize,
    pub domain_words: usize,
    pub value_spans: usize,
    pub candidate_keys: usize,

    pub keys_total: usize,
    pub keys_text_anchored: usize,
    pub keys_value_anchored: usize,
    pub keys_refined: usize,
    pub keys_unmatched: usize,

    pub values_total: usize,
    /// VALUE records emitted, one per physical line.
    pub value_lines: usize,
    pub values_unmatched: usize,

    pub etcs_total: usize,
    pub etcs_matched: usize,
}

impl AlignmentStats {
    /// KEYs anchored in stage 1 or stage 2.
    pub fn keys_matched(&self) -> usize {
        self.keys_text_anchored + self.keys_value_anchored
    }
}

/// Outcome of aligning one template against one target image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentResult {
    /// Auto-mapping result in the template schema.
    pub document: AnnotationDocument,
    /// Template annotations of matched KEY/VALUE pairs and of matched ETCs,
    /// carrying their relocated boxes.
    pub matched_manual: Vec<RelocatedAnnotation>,
    pub stats: AlignmentStats,
    pub candidates: CandidateSet,
}

impl AlignmentResult {
    /// Entries of the auto-mapping result flagged as matched.
    pub fn matched_annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.document
            .annotations
            .iter()
            .filter(|a| a.matched == Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relocated_annotation_serializes_flat() {
        let bbox = BoundingBox::from_coords(100.0, 100.0, 150.0, 120.0);
        let relocated = RelocatedAnnotation {
            annotation: Annotation::key(1, bbox, "Class"),
            moved_from: BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0),
            delta: [90.0, 90.0],
            stage: Some(MatchStage::TextAnchor),
        };
        let value = serde_json::to_value(&relocated).unwrap();
        assert_eq!(value["id"], json!(1));
        assert_eq!(value["type"], json!("key"));
        assert_eq!(value["bbox"], json!([100.0, 100.0, 150.0, 120.0]));
        assert_eq!(value["moved_from"], json!([10.0, 10.0, 60.0, 30.0]));
        assert_eq!(value["stage"], json!(1));
    }

    #[test]
    fn test_keys_matched_sums_stages() {
        let stats = AlignmentStats {
            keys_text_anchored: 3,
            keys_value_anchored: 2,
            ..AlignmentStats::default()
        };
        assert_eq!(stats.keys_matched(), 5);
    }
}
