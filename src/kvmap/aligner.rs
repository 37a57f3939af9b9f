//! Configured entry point for aligning a template against one target image.

use std::time::Instant;

use serde_json::Value;

use crate::core::config::{AlignConfig, ConfigValidator};
use crate::core::errors::KvMapResult;
use crate::domain::annotation::AnnotationDocument;
use crate::domain::words::{Word, WordNormalizer};
use crate::kvmap::assembler;
use crate::kvmap::context::AlignmentContext;
use crate::kvmap::result::AlignmentResult;
use crate::kvmap::stages;

/// Propagates a template onto new images.
///
/// The aligner holds only its configuration; every call builds a fresh
/// [`AlignmentContext`], so one instance can be shared freely across threads.
///
/// # Example
///
/// ```
/// use oar_kvmap::prelude::*;
///
/// let template = AnnotationDocument::new(
///     "template.jpg",
///     vec![Annotation::key(1, BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0), "Class")],
/// );
/// let generic = vec![Word::new(BoundingBox::from_coords(100.0, 100.0, 180.0, 120.0), "Class:8")];
///
/// let result = TemplateAligner::default().align(&template, &generic, &[]);
/// let key = &result.document.annotations[0];
/// assert_eq!(key.bbox, Some(BoundingBox::from_coords(100.0, 100.0, 150.0, 120.0)));
/// assert_eq!(key.matched, Some(true));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateAligner {
    config: AlignConfig,
    normalizer: WordNormalizer,
}

impl TemplateAligner {
    /// Creates an aligner after validating `config`.
    pub fn new(config: AlignConfig) -> KvMapResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            normalizer: WordNormalizer::new(),
        })
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Runs the staged pipeline over already-normalized words.
    pub fn align(
        &self,
        template: &AnnotationDocument,
        generic_words: &[Word],
        domain_words: &[Word],
    ) -> AlignmentResult {
        let start = Instant::now();
        let mut ctx = AlignmentContext::new(&self.config, template, generic_words, domain_words);

        stages::prepare(&mut ctx);
        stages::anchor_keys_by_text(&mut ctx);
        stages::anchor_keys_by_value(&mut ctx);
        stages::refine_value_anchored_keys(&mut ctx);
        stages::match_etcs(&mut ctx);

        let result = assembler::assemble(&ctx);
        let stats = &result.stats;
        tracing::info!(
            image = %template.image,
            keys = stats.keys_total,
            text_anchored = stats.keys_text_anchored,
            value_anchored = stats.keys_value_anchored,
            refined = stats.keys_refined,
            unmatched = stats.keys_unmatched,
            value_lines = stats.value_lines,
            etcs_matched = stats.etcs_matched,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "template aligned"
        );
        result
    }

    /// Normalizes raw OCR payloads, then aligns.
    ///
    /// When the domain payload advertises its image size, the output document
    /// takes that width and height.
    pub fn align_payloads(
        &self,
        template: &AnnotationDocument,
        generic_ocr: &Value,
        domain_ocr: &Value,
    ) -> AlignmentResult {
        let generic = self.normalizer.normalize(generic_ocr);
        let domain = self.normalizer.normalize(domain_ocr);
        tracing::debug!(
            generic_format = ?generic.format,
            generic_words = generic.words.len(),
            domain_format = ?domain.format,
            domain_words = domain.words.len(),
            "normalized OCR payloads"
        );

        let mut result = self.align(template, &generic.words, &domain.words);
        if let Some(size) = domain.image_size.or(generic.image_size) {
            result.document.width = Some(size.width);
            result.document.height = Some(size.height);
        }
        result
    }
}

/// Aligns with the default configuration.
pub fn align(
    template: &AnnotationDocument,
    generic_words: &[Word],
    domain_words: &[Word],
) -> AlignmentResult {
    TemplateAligner::default().align(template, generic_words, domain_words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::KvMapError;
    use crate::domain::annotation::{Annotation, AnnotationKind};
    use crate::processors::geometry::BoundingBox;
    use serde_json::json;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::from_coords(x1, y1, x2, y2)
    }

    fn word(text: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> Word {
        Word::new(bbox(x1, y1, x2, y2), text)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AlignConfig {
            key_refine_iou: -0.1,
            ..AlignConfig::default()
        };
        let err = TemplateAligner::new(config).unwrap_err();
        assert!(matches!(err, KvMapError::ConfigError { .. }));
    }

    #[test]
    fn test_scenario_key_relocated_preserving_width() {
        let template = AnnotationDocument::new(
            "tpl.jpg",
            vec![Annotation::key(1, bbox(10.0, 10.0, 60.0, 30.0), "Class")],
        );
        let generic = vec![word("Class:8", 100.0, 100.0, 180.0, 120.0)];
        let result = align(&template, &generic, &[]);

        assert_eq!(result.matched_manual.len(), 1);
        assert_eq!(
            result.matched_manual[0].annotation.bbox,
            Some(bbox(100.0, 100.0, 150.0, 120.0))
        );
        let key = &result.document.annotations[0];
        assert_eq!(key.bbox, Some(bbox(100.0, 100.0, 150.0, 120.0)));
        assert_eq!(key.matched, Some(true));
    }

    #[test]
    fn test_scenario_space_separated_value_merged() {
        let template = AnnotationDocument::new(
            "tpl.jpg",
            vec![
                Annotation::key(1, bbox(0.0, 60.0, 60.0, 80.0), "Shipper"),
                Annotation::value(2, 1, bbox(0.0, 0.0, 200.0, 50.0)),
            ],
        );
        let generic = vec![word("Shipper", 0.0, 60.0, 60.0, 80.0)];
        let domain = vec![word("A", 0.0, 0.0, 40.0, 20.0), word("B", 45.0, 0.0, 80.0, 20.0)];
        let result = align(&template, &generic, &domain);

        assert_eq!(result.candidates.value_spans.len(), 1);
        assert_eq!(result.candidates.value_spans[0].text, "A B");
        assert_eq!(result.candidates.value_spans[0].bbox, bbox(0.0, 0.0, 80.0, 20.0));

        let value = result
            .document
            .annotations
            .iter()
            .find(|a| a.kind == AnnotationKind::Value)
            .unwrap();
        assert_eq!(value.text.as_deref(), Some("A B"));
        assert_eq!(value.matched, Some(true));
    }

    #[test]
    fn test_scenario_line_break_yields_two_values() {
        let template = AnnotationDocument::new(
            "tpl.jpg",
            vec![
                Annotation::key(1, bbox(0.0, 0.0, 40.0, 20.0), "Port"),
                Annotation::value(2, 1, bbox(50.0, 0.0, 300.0, 200.0)),
            ],
        );
        let generic = vec![word("Port", 0.0, 0.0, 40.0, 20.0)];
        let domain = vec![
            word("SEOUL", 60.0, 10.0, 120.0, 30.0),
            word("KOREA", 60.0, 80.0, 120.0, 100.0),
        ];
        let result = align(&template, &generic, &domain);

        let orders: Vec<Option<u32>> = result
            .document
            .annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::Value)
            .map(|a| a.order)
            .collect();
        assert_eq!(orders, vec![Some(1), Some(2)]);
        assert_eq!(result.stats.value_lines, 2);
    }

    #[test]
    fn test_payloads_normalized_and_sized() {
        let template = AnnotationDocument::from_value(json!({
            "image": "tpl.jpg",
            "width": 1000,
            "height": 1400,
            "annotations": [
                {"id": 1, "type": "key", "bbox": [10, 10, 60, 30], "text": "Class", "key_id": 1},
                {"id": 2, "type": "value", "bbox": [70, 10, 200, 30], "text": null, "key_id": "1"}
            ]
        }))
        .unwrap();
        let generic = json!({"words": [{"text": "Class", "bbox": [110, 20, 160, 40]}]});
        let domain = json!({
            "Images": {"width": 2000, "height": 2800},
            "bbox": [{"x": [182, 300, 300, 182], "y": [20, 20, 40, 40], "data": "8"}]
        });
        let result = TemplateAligner::default().align_payloads(&template, &generic, &domain);

        assert_eq!(result.document.width, Some(2000));
        assert_eq!(result.document.height, Some(2800));
        let value = &result.document.annotations[1];
        assert_eq!(value.text.as_deref(), Some("8"));
        assert_eq!(value.bbox, Some(bbox(182.0, 20.0, 300.0, 40.0)));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let template = AnnotationDocument::new(
            "tpl.jpg",
            vec![
                Annotation::key(1, bbox(10.0, 10.0, 60.0, 30.0), "Weight"),
                Annotation::value(2, 1, bbox(100.0, 10.0, 200.0, 30.0)),
                Annotation::key(3, bbox(10.0, 60.0, 60.0, 80.0), "Class"),
                Annotation::value(4, 3, bbox(100.0, 60.0, 200.0, 80.0)),
                Annotation::etc(5, bbox(0.0, 300.0, 100.0, 320.0), "Remarks"),
            ],
        );
        let generic = vec![
            word("W3!qht", 32.0, 27.0, 80.0, 45.0),
            word("Class", 20.0, 70.0, 70.0, 90.0),
            word("Remarks", 10.0, 305.0, 95.0, 325.0),
        ];
        let domain = vec![
            word("1,200", 120.0, 25.0, 160.0, 45.0),
            word("KG", 165.0, 25.0, 190.0, 45.0),
            word("8", 110.0, 70.0, 130.0, 90.0),
        ];

        let first = serde_json::to_string(&align(&template, &generic, &domain)).unwrap();
        let second = serde_json::to_string(&align(&template, &generic, &domain)).unwrap();
        assert_eq!(first, second);
    }
}
