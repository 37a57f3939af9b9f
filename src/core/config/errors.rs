//! Configuration error types and validation helpers.

use thiserror::Error;

/// Enum representing errors found while validating a configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A ratio or threshold is outside `[0, 1]`.
    #[error("{field} must be within [0, 1], got {value}")]
    RatioOutOfRange { field: &'static str, value: f32 },

    /// A factor or pixel radius is negative or not finite.
    #[error("{field} must be a finite, non-negative number, got {value}")]
    InvalidMagnitude { field: &'static str, value: f32 },

    /// A count must be at least one.
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
}

/// A trait for validating configuration parameters.
///
/// Implementors provide [`ConfigValidator::validate`]; the helper methods cover
/// the recurring checks on thresholds, pixel distances and counts.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Checks that `value` is a finite ratio in `[0, 1]`.
    fn validate_ratio(&self, field: &'static str, value: f32) -> Result<(), ConfigError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::RatioOutOfRange { field, value })
        }
    }

    /// Checks that `value` is finite and `>= 0`.
    fn validate_magnitude(&self, field: &'static str, value: f32) -> Result<(), ConfigError> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidMagnitude { field, value })
        }
    }

    /// Checks that a count is non-zero.
    fn validate_count(&self, field: &'static str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::ZeroCount { field })
        } else {
            Ok(())
        }
    }
}
