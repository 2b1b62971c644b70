//! Error constructor utilities.
//!
//! Helpers for building [`InspectError`] values with consistent messages.
//! Shape checks in the fusion stages go through [`InspectError::shape_mismatch`]
//! so every contract violation reads the same way in logs.

use std::path::Path;

use super::types::{InspectError, ProcessingStage};

impl InspectError {
    /// Creates a `NotFound` error for an image that failed to load.
    pub fn not_found(path: &Path, source: image::ImageError) -> Self {
        Self::NotFound {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a `Degenerate` error.
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::Degenerate {
            message: message.into(),
        }
    }

    /// Creates an `InvalidArgument` error describing a tensor shape mismatch.
    ///
    /// # Arguments
    ///
    /// * `component` - The component performing the check.
    /// * `tensor` - Name of the offending tensor.
    /// * `expected` - Expected shape, rendered for the message.
    /// * `actual` - Actual shape.
    pub fn shape_mismatch(component: &str, tensor: &str, expected: &str, actual: &[usize]) -> Self {
        Self::InvalidArgument {
            message: format!(
                "{}: tensor '{}' expected shape {}, got {:?}",
                component, tensor, expected, actual
            ),
        }
    }

    /// Wraps an underlying error as a failure of `stage`.
    pub fn processing(
        stage: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: stage,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Returns true when the error aborts only the current image of a batch.
    ///
    /// Load failures are per-image; everything else signals a misconfiguration
    /// that would fail every image the same way.
    pub fn is_per_image(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mentions_path() {
        let err = InspectError::not_found(
            Path::new("missing/car.png"),
            image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            )),
        );
        assert!(err.to_string().contains("missing/car.png"));
        assert!(err.is_per_image());
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = InspectError::shape_mismatch("Voter", "confidences", "[3, 1, 4]", &[2, 1, 4]);
        let msg = err.to_string();
        assert!(msg.contains("confidences"));
        assert!(msg.contains("[2, 1, 4]"));
        assert!(!err.is_per_image());
    }
}
