//! Request and response types shared between CLI and server modes.

use oar_kvmap::core::{AlignConfig, KvMapResult};
use oar_kvmap::domain::AnnotationDocument;
use oar_kvmap::kvmap::{AlignmentResult, TemplateAligner};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to align a template onto one image
#[derive(Debug, Deserialize)]
pub struct AlignRequest {
    /// Template annotation document
    pub template: AnnotationDocument,
    /// Generic OCR payload in any supported shape
    pub generic_ocr: Value,
    /// Domain OCR payload in any supported shape
    pub domain_ocr: Value,
    /// Name written into the output document's `image` field
    #[serde(default)]
    pub image_name: Option<String>,
    /// Per-request configuration; replaces the server's configuration
    #[serde(default)]
    pub config: Option<AlignConfig>,
}

/// Response from an alignment
#[derive(Debug, Serialize)]
pub struct AlignResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AlignmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

impl AlignResponse {
    pub fn ok(result: AlignmentResult, processing_time_ms: f64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            processing_time_ms: Some(processing_time_ms),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message),
            processing_time_ms: None,
        }
    }
}

/// Aligns one request with either its own or the default aligner.
pub fn run_alignment(
    default_aligner: &TemplateAligner,
    request: &AlignRequest,
) -> KvMapResult<AlignmentResult> {
    let custom;
    let aligner = match &request.config {
        Some(config) => {
            custom = TemplateAligner::new(config.clone())?;
            &custom
        }
        None => default_aligner,
    };

    let mut result =
        aligner.align_payloads(&request.template, &request.generic_ocr, &request.domain_ocr);
    if let Some(name) = &request.image_name {
        result.document.image = name.clone();
    }
    Ok(result)
}
