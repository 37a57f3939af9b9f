//! Core error types for the key/value mapping engine.
//!
//! The alignment stages themselves never fail: malformed OCR records are dropped
//! and unmatched annotations are tagged instead. The types here cover the layers
//! around the core (template ingestion, configuration, batch runs and the front ends).

use thiserror::Error;

/// Enum representing the phase of work an error occurred in.
///
/// Used to give [`KvMapError::Processing`] enough context for the batch report
/// and for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Reading the annotation template.
    TemplateLoad,
    /// Reading one of the OCR payloads.
    OcrLoad,
    /// Writing the aligned document.
    OutputWrite,
    /// Batch bookkeeping (pairing files, collecting results).
    BatchProcessing,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TemplateLoad => write!(f, "template load"),
            ProcessingStage::OcrLoad => write!(f, "ocr load"),
            ProcessingStage::OutputWrite => write!(f, "output write"),
            ProcessingStage::BatchProcessing => write!(f, "batch processing"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Errors that can occur around the alignment pipeline.
#[derive(Error, Debug)]
pub enum KvMapError {
    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// A target image has no OCR payload of the given kind.
    #[error("no {source_name} payload found for '{image}'")]
    MissingCounterpart {
        /// Name of the target image (or its file stem).
        image: String,
        /// Which OCR source is missing ("generic OCR" or "domain OCR").
        source_name: String,
    },

    /// The run was cancelled before this item started.
    #[error("cancelled")]
    Cancelled,

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl From<crate::core::config::ConfigError> for KvMapError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::config_error(error.to_string())
    }
}

impl KvMapError {
    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Wraps an error with the stage it happened in.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates a missing-counterpart error for a batch item.
    pub fn missing_counterpart(image: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::MissingCounterpart {
            image: image.into(),
            source_name: source_name.into(),
        }
    }

    /// Renders the error together with its source chain on one line.
    ///
    /// Batch entries store this string, so it has to carry the underlying cause
    /// (e.g. the serde position of a JSON syntax error).
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_error_display_includes_stage() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err = KvMapError::processing(ProcessingStage::OcrLoad, "reading generic OCR", io);
        assert_eq!(err.to_string(), "ocr load failed: reading generic OCR");
        assert_eq!(err.report(), "ocr load failed: reading generic OCR: missing.json");
    }

    #[test]
    fn test_missing_counterpart_message() {
        let err = KvMapError::missing_counterpart("invoice_01", "domain OCR");
        assert_eq!(err.to_string(), "no domain OCR payload found for 'invoice_01'");
    }

    #[test]
    fn test_config_error_conversion_keeps_field() {
        let err: KvMapError = crate::core::config::ConfigError::ZeroCount {
            field: "etc_prefix_len",
        }
        .into();
        assert!(matches!(err, KvMapError::ConfigError { .. }));
        assert_eq!(err.to_string(), "configuration: etc_prefix_len must be at least 1");
    }
}
