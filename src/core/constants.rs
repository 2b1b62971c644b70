//! Constants used throughout the inspection pipelines.
//!
//! Defaults for every tunable stage parameter live here so configuration
//! types and tests agree on a single value.

/// Lower hysteresis threshold of the ROI edge detector.
pub const DEFAULT_CANNY_LOW: f32 = 50.0;

/// Upper hysteresis threshold of the ROI edge detector.
pub const DEFAULT_CANNY_HIGH: f32 = 150.0;

/// Edge-pixel ratio above which the ROI misalignment alarm fires.
pub const DEFAULT_EDGE_ALARM_RATIO: f32 = 0.01;

/// CLAHE clip limit, relative to a flat histogram.
pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Number of CLAHE tiles along each image axis.
pub const DEFAULT_CLAHE_TILE_GRID: u32 = 8;

/// Side of the square opening kernel (speckle removal).
pub const DEFAULT_OPEN_KERNEL: u32 = 3;

/// Side of the square closing kernel (gap bridging).
pub const DEFAULT_CLOSE_KERNEL: u32 = 7;

/// Number of anisotropic diffusion iterations.
pub const DEFAULT_DIFFUSION_ITERATIONS: u32 = 10;

/// Edge-stopping constant of the diffusion conductance, on the unit mask scale.
pub const DEFAULT_DIFFUSION_KAPPA: f32 = 0.75;

/// Diffusion integration step; stable for values up to 0.25.
pub const DEFAULT_DIFFUSION_GAMMA: f32 = 0.1;

/// Minimum polygon area (px²) for a candidate to become a weak label.
pub const DEFAULT_MIN_AREA: f32 = 50.0;

/// Default label attached to weak-label annotations.
pub const DEFAULT_ANNOTATION_LABEL: &str = "defect";

/// Batches at or below this size are processed sequentially.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// Feature width of the default classifier backbone.
pub const DEFAULT_FEATURE_DIM: usize = 768;

/// Binarization level applied to the unit-scale field after diffusion smoothing.
pub const MASK_THRESHOLD: f32 = 0.5;

/// Value written to foreground mask pixels.
pub const MASK_ON: u8 = 255;
