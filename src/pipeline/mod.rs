//! End-to-end orchestration of the two inspection pipelines.
//!
//! [`PreprocessPipeline`] turns raw photographs into refined masks and
//! weak-label regions; [`FusionPipeline`] turns precomputed model outputs
//! into per-image verdicts. The two share no state and may run concurrently.

pub mod fusion;
pub mod preprocess;

pub use fusion::{FusionPipeline, FusionReport};
pub use preprocess::{BatchItem, PreprocessOutput, PreprocessPipeline};
