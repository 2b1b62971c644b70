//! Domain types shared by the preprocessing and fusion pipelines.

pub mod model;
pub mod paint;
pub mod region;
pub mod roi;
pub mod verdict;

pub use model::{AugmentationPreset, ClassifierConfig, ModelOutput, stack_model_outputs};
pub use paint::{HsvRange, PaintType};
pub use region::{AnnotationRecord, CandidateRegion, Point, Polygon, write_annotations};
pub use roi::Roi;
pub use verdict::Verdict;
