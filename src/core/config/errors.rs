//! Configuration error types and validation traits.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A morphology kernel size is not a positive odd number.
    #[error("kernel '{name}' must be an odd size between 1 and 511, got {size}")]
    InvalidKernelSize { name: String, size: u32 },

    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// A trait for validating configuration parameters.
///
/// Implemented by every configuration section so a whole
/// [`InspectionConfig`](super::InspectionConfig) can be checked once,
/// before any image is processed.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates a morphology kernel size (odd, at least 1).
    fn validate_kernel_size(&self, name: &str, size: u32) -> Result<(), ConfigError> {
        if size == 0 || size % 2 == 0 {
            Err(ConfigError::InvalidKernelSize {
                name: name.to_string(),
                size,
            })
        } else {
            Ok(())
        }
    }

    /// Validates that a threshold is finite and non-negative.
    fn validate_threshold(&self, name: &str, value: f32) -> Result<(), ConfigError> {
        if !value.is_finite() || value < 0.0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{} must be finite and non-negative, got {}", name, value),
            })
        } else {
            Ok(())
        }
    }

    /// Validates that a ratio lies in [0.0, 1.0].
    fn validate_ratio(&self, name: &str, value: f32) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            Err(ConfigError::InvalidConfig {
                message: format!("{} must be between 0.0 and 1.0, got {}", name, value),
            })
        } else {
            Ok(())
        }
    }

    /// Validates that a count is strictly positive.
    fn validate_positive_count(&self, name: &str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{} must be greater than 0", name),
            })
        } else {
            Ok(())
        }
    }
}
