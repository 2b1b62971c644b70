//! Classical image processing stages of the preprocessing pipeline.
//!
//! # Modules
//!
//! * `roi` - ROI cropping with an edge-density misalignment alarm
//! * `segmentation` - Paint-specific HSV thresholding after illumination normalization
//! * `morphology` - Opening, closing and anisotropic diffusion of binary masks
//! * `weak_label` - Contour extraction and minimum-area filtering
//! * `clahe` - Contrast-limited adaptive histogram equalization
//! * `color` - HSV and Lab conversions

pub mod clahe;
pub mod color;
pub mod morphology;
pub mod roi;
pub mod segmentation;
pub mod weak_label;

pub use clahe::Clahe;
pub use color::{lab_to_rgb, normalize_illumination, rgb_to_hsv, rgb_to_lab};
pub use morphology::{MorphologicalRefiner, anisotropic_diffusion, mask_field};
pub use roi::{RoiCheck, RoiValidator};
pub use segmentation::ColorSegmenter;
pub use weak_label::{WeakLabelFilter, extract_candidates};
