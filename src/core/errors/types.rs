//! Core error type definitions for the inspection pipelines.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::config::ConfigError;

/// Enum representing the operations that wrap lower-level failures.
///
/// Used to tag [`InspectError::Processing`] with the operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Building the dedicated worker pool for a batch.
    ThreadPool,
    /// Writing weak-label annotation records.
    AnnotationExport,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::ThreadPool => write!(f, "thread pool setup"),
            ProcessingStage::AnnotationExport => write!(f, "annotation export"),
        }
    }
}

/// Errors produced by the preprocessing and fusion pipelines.
#[derive(Error, Debug)]
pub enum InspectError {
    /// The source image could not be opened or decoded.
    #[error("image not found or unreadable: {}", path.display())]
    NotFound {
        /// Path of the offending image.
        path: PathBuf,
        /// Decoder or I/O failure reported by the `image` crate.
        #[source]
        source: image::ImageError,
    },

    /// A caller-supplied argument violates the stage contract.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// A message describing the violated contract.
        message: String,
    },

    /// Input is well-formed but structurally unusable.
    #[error("degenerate input: {message}")]
    Degenerate {
        /// A message describing the degenerate structure.
        message: String,
    },

    /// A named stage failed with an underlying error.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization")]
    Serialization(#[from] serde_json::Error),
}
