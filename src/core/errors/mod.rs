//! Error types for the key/value mapping engine.
//!
//! # Usage
//!
//! ```rust
//! use oar_kvmap::core::config::ConfigError;
//! use oar_kvmap::core::errors::{KvMapError, ProcessingStage};
//!
//! // Wrap a lower-level failure with the stage it happened in
//! let error = KvMapError::processing(
//!     ProcessingStage::OcrLoad,
//!     "reading domain OCR for invoice_01",
//!     std::io::Error::new(std::io::ErrorKind::NotFound, "invoice_01.json"),
//! );
//! assert!(error.report().contains("invoice_01.json"));
//!
//! // Validation failures convert into a configuration error
//! let config_error: KvMapError = ConfigError::ZeroCount { field: "etc_fuzzy_words" }.into();
//! assert!(matches!(config_error, KvMapError::ConfigError { .. }));
//! ```

pub mod types;

pub use types::{KvMapError, ProcessingStage};

/// Convenient result alias for fallible operations around the alignment core.
pub type KvMapResult<T> = Result<T, KvMapError>;
