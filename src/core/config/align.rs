//! Thresholds and radii for the alignment pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};
use crate::core::errors::{KvMapError, KvMapResult, ProcessingStage};

/// Configuration for a template alignment run.
///
/// Every field has a default, so a partial JSON object such as
/// `{"key_snap_radius": 30}` is a valid configuration file. Height-relative
/// factors are multiplied by the mean word height of the set being merged;
/// radii and margins are in OCR pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Minimum Levenshtein similarity for a fuzzy KEY text match.
    pub text_similarity_threshold: f32,
    /// Compare KEY text (and its leading character in stage 3) case-sensitively.
    pub case_sensitive_keys: bool,
    /// Two words share a row when their vertical centres differ by less than
    /// `avg_height * same_line_factor`.
    pub same_line_factor: f32,
    /// Largest horizontal gap between row neighbours, as a multiple of `avg_height`.
    pub space_gap_factor: f32,
    /// Vertical gap that starts a new physical line, as a multiple of `avg_height`.
    pub line_break_factor: f32,
    /// Generic words covered by a merged VALUE span at least this much are not KEY candidates.
    pub key_exclusion_overlap: f32,
    /// When set, a KEY without a textual candidate may match the generic word
    /// with the highest IoU against it, provided the IoU reaches this value.
    pub key_iou_fallback: Option<f32>,
    /// Margin used when checking whether a merged span sits inside a VALUE box.
    pub value_containment_margin: f32,
    /// Maximum top-left distance between a VALUE and a merged span in stage 2.
    pub value_anchor_radius: f32,
    /// Maximum top-left distance for the stage-2 KEY micro-snap.
    pub key_snap_radius: f32,
    /// Minimum IoU for replacing a relocated KEY box by an OCR word.
    pub key_refine_iou: f32,
    /// Minimum overlap ratio for a domain word to be collected into a VALUE.
    pub value_overlap_ratio: f32,
    /// Number of leading characters compared by the ETC prefix rule.
    pub etc_prefix_len: usize,
    /// Number of leading words compared by the ETC fuzzy-word rule.
    pub etc_fuzzy_words: usize,
    /// Fuzzy word hits required when the ETC text has more than one word.
    pub etc_min_word_matches: usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            text_similarity_threshold: 0.8,
            case_sensitive_keys: false,
            same_line_factor: 0.5,
            space_gap_factor: 1.0,
            line_break_factor: 1.5,
            key_exclusion_overlap: 0.8,
            key_iou_fallback: None,
            value_containment_margin: 30.0,
            value_anchor_radius: 50.0,
            key_snap_radius: 50.0,
            key_refine_iou: 0.6,
            value_overlap_ratio: 0.6,
            etc_prefix_len: 10,
            etc_fuzzy_words: 3,
            etc_min_word_matches: 2,
        }
    }
}

impl AlignConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> KvMapResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            KvMapError::processing(
                ProcessingStage::Generic,
                format!("reading config {}", path.display()),
                e,
            )
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            KvMapError::processing(
                ProcessingStage::Generic,
                format!("parsing config {}", path.display()),
                e,
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the KEY micro-snap radius.
    pub fn with_key_snap_radius(mut self, radius: f32) -> Self {
        self.key_snap_radius = radius;
        self
    }

    /// Enable (or disable with `None`) the stage-1 IoU fallback.
    pub fn with_key_iou_fallback(mut self, threshold: Option<f32>) -> Self {
        self.key_iou_fallback = threshold;
        self
    }

    /// Toggle case-sensitive KEY matching.
    pub fn with_case_sensitive_keys(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive_keys = case_sensitive;
        self
    }

    /// Set the line-break factor used when splitting VALUE lines.
    pub fn with_line_break_factor(mut self, factor: f32) -> Self {
        self.line_break_factor = factor;
        self
    }
}

impl ConfigValidator for AlignConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_ratio("text_similarity_threshold", self.text_similarity_threshold)?;
        self.validate_ratio("key_exclusion_overlap", self.key_exclusion_overlap)?;
        self.validate_ratio("key_refine_iou", self.key_refine_iou)?;
        self.validate_ratio("value_overlap_ratio", self.value_overlap_ratio)?;
        if let Some(threshold) = self.key_iou_fallback {
            self.validate_ratio("key_iou_fallback", threshold)?;
        }

        self.validate_magnitude("same_line_factor", self.same_line_factor)?;
        self.validate_magnitude("space_gap_factor", self.space_gap_factor)?;
        self.validate_magnitude("line_break_factor", self.line_break_factor)?;
        self.validate_magnitude("value_containment_margin", self.value_containment_margin)?;
        self.validate_magnitude("value_anchor_radius", self.value_anchor_radius)?;
        self.validate_magnitude("key_snap_radius", self.key_snap_radius)?;

        self.validate_count("etc_prefix_len", self.etc_prefix_len)?;
        self.validate_count("etc_fuzzy_words", self.etc_fuzzy_words)?;
        self.validate_count("etc_min_word_matches", self.etc_min_word_matches)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AlignConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AlignConfig = serde_json::from_str(r#"{"key_snap_radius": 30}"#).unwrap();
        assert_eq!(config.key_snap_radius, 30.0);
        assert_eq!(config.key_refine_iou, 0.6);
        assert_eq!(config.key_iou_fallback, None);
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        let config = AlignConfig {
            key_refine_iou: 1.5,
            ..AlignConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange {
                field: "key_refine_iou",
                value: 1.5
            })
        );
    }

    #[test]
    fn test_negative_radius_and_nan_rejected() {
        let config = AlignConfig::default().with_key_snap_radius(-1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMagnitude { field: "key_snap_radius", .. })
        ));

        let config = AlignConfig::default().with_line_break_factor(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_counts_rejected() {
        let config = AlignConfig {
            etc_fuzzy_words: 0,
            ..AlignConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCount {
                field: "etc_fuzzy_words"
            })
        );
    }

    #[test]
    fn test_zero_etc_prefix_rejected() {
        let config = AlignConfig {
            etc_prefix_len: 0,
            ..AlignConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCount {
                field: "etc_prefix_len"
            })
        );
    }

    #[test]
    fn test_fallback_threshold_validated_when_set() {
        let config = AlignConfig::default().with_key_iou_fallback(Some(2.0));
        assert!(config.validate().is_err());
        let config = AlignConfig::default().with_key_iou_fallback(Some(0.3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"value_overlap_ratio": 3.0}}"#).unwrap();
        let err = AlignConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, KvMapError::ConfigError { .. }));
        assert!(err.to_string().contains("value_overlap_ratio"));
    }

    #[test]
    fn test_from_json_file_reports_syntax_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = AlignConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            KvMapError::Processing {
                kind: ProcessingStage::Generic,
                ..
            }
        ));
    }
}
