//! Error types for the inspection pipelines.
//!
//! # Usage
//!
//! ```rust
//! use paint_inspect::core::errors::{InspectError, ProcessingStage};
//!
//! let error = InspectError::invalid_argument("unknown paint type 'blue'");
//! assert!(error.to_string().contains("blue"));
//!
//! let wrapped = InspectError::processing(
//!     ProcessingStage::AnnotationExport,
//!     "writing labels/door.json",
//!     std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
//! );
//! assert!(wrapped.to_string().starts_with("annotation export failed"));
//! ```

pub mod constructors;
pub mod types;

pub use types::{InspectError, ProcessingStage};

/// Convenient result alias for inspection operations.
pub type InspectResult<T> = Result<T, InspectError>;
