//! # Paint Inspect
//!
//! A Rust library for vehicle paint defect inspection. It covers the
//! deterministic stages around two neural detectors: the classical
//! preprocessing that turns photographs into weak-label defect regions, and
//! the fusion that turns several classifiers' patch outputs into one verdict
//! per image.
//!
//! ## Features
//!
//! - ROI cropping with an edge-density misalignment alarm
//! - Paint-specific segmentation (black, white, red) after CLAHE illumination normalization
//! - Morphological refinement with anisotropic diffusion smoothing
//! - Contour extraction, minimum-area filtering and JSON annotation records
//! - Attention-based cross-model feature alignment with optional projections
//! - Spatial grid reconstruction, confidence-weighted voting and decision fusion
//! - Rayon batch processing that keeps going past unreadable images
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration, constants and validation helpers
//! * [`domain`] - Paint types, ROI, regions, model outputs and verdicts
//! * [`processors`] - Classical image processing stages
//! * [`fusion`] - Multi-model fusion stages
//! * [`pipeline`] - Orchestration of both pipelines
//! * [`utils`] - Image loading and mask helpers
//!
//! ## Quick Start
//!
//! ### Preprocessing
//!
//! ```rust,no_run
//! use paint_inspect::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PreprocessConfig::new(Roi::new(100, 80, 640, 480), PaintType::Red)
//!     .with_min_area(80.0);
//! let pipeline = PreprocessPipeline::new(config)?;
//!
//! let output = pipeline.run_path(Path::new("station_3/door_left.jpg"))?;
//! if output.alarm {
//!     eprintln!("vehicle may be misaligned (edge ratio {:.3})", output.edge_ratio);
//! }
//! write_annotations(
//!     Path::new("door_left.json"),
//!     &output.annotations(Some(Path::new("station_3/door_left.jpg"))),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Fusion
//!
//! ```rust,no_run
//! use paint_inspect::prelude::*;
//!
//! # fn run(outputs: Vec<ModelOutput>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = FusionConfig::new(14, 14)
//!     .with_confidence_scale(10.0)
//!     .with_association(AssociationMode::GridProximity { sigma: 1.5 });
//! let report = FusionPipeline::new(config)?.run(&outputs, None)?;
//! for verdict in &report.verdicts {
//!     println!("class {} ({:.2})", verdict.label, verdict.confidence);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod fusion;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use paint_inspect::prelude::*;
/// ```
///
/// Included items cover the common path through both pipelines. Individual
/// stages live in [`processors`](crate::processors) and [`fusion`](crate::fusion).
pub mod prelude {
    // Pipelines
    pub use crate::pipeline::{
        BatchItem, FusionPipeline, FusionReport, PreprocessOutput, PreprocessPipeline,
    };

    // Configuration
    pub use crate::core::config::{
        AssociationMode, ConfigValidator, FusionConfig, InspectionConfig, ParallelPolicy,
        PreprocessConfig, VotingStrategy,
    };

    // Domain
    pub use crate::domain::{
        AnnotationRecord, ClassifierConfig, ModelOutput, PaintType, Roi, Verdict,
        write_annotations,
    };

    // Error Handling
    pub use crate::core::{InspectError, InspectResult};

    // Image Utility
    pub use crate::utils::load_image;
}
