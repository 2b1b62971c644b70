//! Inspection configuration.
//!
//! Every tunable of both pipelines lives in an immutable value passed into
//! each run, so stations with different cameras or paint lines can share a
//! process without sharing settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};
use super::parallel::ParallelPolicy;
use crate::core::InspectResult;
use crate::core::constants::*;
use crate::domain::{ClassifierConfig, HsvRange, PaintType, Roi};

/// Edge-density alarm used to detect a vehicle drifting out of the ROI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAlarmConfig {
    /// Lower hysteresis threshold of the edge detector.
    #[serde(default = "EdgeAlarmConfig::default_low")]
    pub low_threshold: f32,
    /// Upper hysteresis threshold of the edge detector.
    #[serde(default = "EdgeAlarmConfig::default_high")]
    pub high_threshold: f32,
    /// Alarm fires when the edge-pixel ratio is strictly above this value.
    #[serde(default = "EdgeAlarmConfig::default_ratio")]
    pub alarm_ratio: f32,
}

impl EdgeAlarmConfig {
    fn default_low() -> f32 {
        DEFAULT_CANNY_LOW
    }
    fn default_high() -> f32 {
        DEFAULT_CANNY_HIGH
    }
    fn default_ratio() -> f32 {
        DEFAULT_EDGE_ALARM_RATIO
    }
}

impl Default for EdgeAlarmConfig {
    fn default() -> Self {
        Self {
            low_threshold: DEFAULT_CANNY_LOW,
            high_threshold: DEFAULT_CANNY_HIGH,
            alarm_ratio: DEFAULT_EDGE_ALARM_RATIO,
        }
    }
}

impl ConfigValidator for EdgeAlarmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_threshold("low_threshold", self.low_threshold)?;
        self.validate_threshold("high_threshold", self.high_threshold)?;
        if self.low_threshold > self.high_threshold {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "low_threshold {} exceeds high_threshold {}",
                    self.low_threshold, self.high_threshold
                ),
            });
        }
        self.validate_ratio("alarm_ratio", self.alarm_ratio)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Illumination normalization and per-paint HSV thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// CLAHE clip limit relative to a flat histogram.
    #[serde(default = "SegmentationConfig::default_clip_limit")]
    pub clip_limit: f32,
    /// CLAHE tiles per axis.
    #[serde(default = "SegmentationConfig::default_tile_grid")]
    pub tile_grid: u32,
    #[serde(default = "SegmentationConfig::default_black")]
    pub black: Vec<HsvRange>,
    #[serde(default = "SegmentationConfig::default_white")]
    pub white: Vec<HsvRange>,
    #[serde(default = "SegmentationConfig::default_red")]
    pub red: Vec<HsvRange>,
}

impl SegmentationConfig {
    /// HSV ranges selected for `paint`.
    pub fn ranges_for(&self, paint: PaintType) -> &[HsvRange] {
        match paint {
            PaintType::Black => &self.black,
            PaintType::White => &self.white,
            PaintType::Red => &self.red,
        }
    }

    fn default_clip_limit() -> f32 {
        DEFAULT_CLAHE_CLIP_LIMIT
    }
    fn default_tile_grid() -> u32 {
        DEFAULT_CLAHE_TILE_GRID
    }
    fn default_black() -> Vec<HsvRange> {
        PaintType::Black.default_ranges()
    }
    fn default_white() -> Vec<HsvRange> {
        PaintType::White.default_ranges()
    }
    fn default_red() -> Vec<HsvRange> {
        PaintType::Red.default_ranges()
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            clip_limit: DEFAULT_CLAHE_CLIP_LIMIT,
            tile_grid: DEFAULT_CLAHE_TILE_GRID,
            black: Self::default_black(),
            white: Self::default_white(),
            red: Self::default_red(),
        }
    }
}

impl ConfigValidator for SegmentationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_threshold("clip_limit", self.clip_limit)?;
        self.validate_positive_count("tile_grid", self.tile_grid as usize)?;
        for paint in PaintType::ALL {
            let ranges = self.ranges_for(paint);
            if ranges.is_empty() {
                return Err(ConfigError::InvalidConfig {
                    message: format!("no HSV ranges configured for {} paint", paint),
                });
            }
            if let Some(bad) = ranges.iter().find(|r| !r.is_well_formed()) {
                return Err(ConfigError::InvalidConfig {
                    message: format!("malformed HSV range for {} paint: {:?}", paint, bad),
                });
            }
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Kernel sizes and diffusion parameters of the mask refiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphologyConfig {
    /// Opening kernel side; must be narrower than the thinnest real defect.
    #[serde(default = "MorphologyConfig::default_open")]
    pub open_kernel: u32,
    /// Closing kernel side; must exceed the widest gap inside a broken
    /// scratch and stay below the spacing between distinct defects.
    #[serde(default = "MorphologyConfig::default_close")]
    pub close_kernel: u32,
    #[serde(default = "MorphologyConfig::default_iterations")]
    pub diffusion_iterations: u32,
    /// Conductance edge-stopping constant, in units of the `[0, 1]` mask field.
    #[serde(default = "MorphologyConfig::default_kappa")]
    pub diffusion_kappa: f32,
    #[serde(default = "MorphologyConfig::default_gamma")]
    pub diffusion_gamma: f32,
}

impl MorphologyConfig {
    fn default_open() -> u32 {
        DEFAULT_OPEN_KERNEL
    }
    fn default_close() -> u32 {
        DEFAULT_CLOSE_KERNEL
    }
    fn default_iterations() -> u32 {
        DEFAULT_DIFFUSION_ITERATIONS
    }
    fn default_kappa() -> f32 {
        DEFAULT_DIFFUSION_KAPPA
    }
    fn default_gamma() -> f32 {
        DEFAULT_DIFFUSION_GAMMA
    }
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            open_kernel: DEFAULT_OPEN_KERNEL,
            close_kernel: DEFAULT_CLOSE_KERNEL,
            diffusion_iterations: DEFAULT_DIFFUSION_ITERATIONS,
            diffusion_kappa: DEFAULT_DIFFUSION_KAPPA,
            diffusion_gamma: DEFAULT_DIFFUSION_GAMMA,
        }
    }
}

impl ConfigValidator for MorphologyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_kernel_size("open_kernel", self.open_kernel)?;
        self.validate_kernel_size("close_kernel", self.close_kernel)?;
        // kernel radius is stored as u8 by imageproc
        for (name, size) in [("open_kernel", self.open_kernel), ("close_kernel", self.close_kernel)] {
            if size > 511 {
                return Err(ConfigError::InvalidKernelSize {
                    name: name.to_string(),
                    size,
                });
            }
        }
        if !self.diffusion_kappa.is_finite() || self.diffusion_kappa <= 0.0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("diffusion_kappa must be positive, got {}", self.diffusion_kappa),
            });
        }
        if !(self.diffusion_gamma > 0.0 && self.diffusion_gamma <= 0.25) {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "diffusion_gamma must be in (0, 0.25], got {}",
                    self.diffusion_gamma
                ),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Configuration of the classical preprocessing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Crop window for this camera station.
    pub roi: Roi,
    /// Paint line being inspected.
    pub paint_type: PaintType,
    #[serde(default)]
    pub edge: EdgeAlarmConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub morphology: MorphologyConfig,
    /// Minimum polygon area (px²) for a weak label.
    #[serde(default = "PreprocessConfig::default_min_area")]
    pub min_area: f32,
    /// Label attached to every emitted annotation.
    #[serde(default = "PreprocessConfig::default_label")]
    pub annotation_label: String,
    /// Treat an image with no surviving candidates as degenerate.
    #[serde(default)]
    pub require_candidates: bool,
}

impl PreprocessConfig {
    /// Creates a configuration with default stage parameters.
    pub fn new(roi: Roi, paint_type: PaintType) -> Self {
        Self {
            roi,
            paint_type,
            edge: EdgeAlarmConfig::default(),
            segmentation: SegmentationConfig::default(),
            morphology: MorphologyConfig::default(),
            min_area: DEFAULT_MIN_AREA,
            annotation_label: DEFAULT_ANNOTATION_LABEL.to_string(),
            require_candidates: false,
        }
    }

    pub fn with_min_area(mut self, min_area: f32) -> Self {
        self.min_area = min_area;
        self
    }

    pub fn with_morphology(mut self, morphology: MorphologyConfig) -> Self {
        self.morphology = morphology;
        self
    }

    pub fn with_require_candidates(mut self, require: bool) -> Self {
        self.require_candidates = require;
        self
    }

    fn default_min_area() -> f32 {
        DEFAULT_MIN_AREA
    }
    fn default_label() -> String {
        DEFAULT_ANNOTATION_LABEL.to_string()
    }
}

impl ConfigValidator for PreprocessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.roi.width == 0 || self.roi.height == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "ROI dimensions must be positive, got {}x{}",
                    self.roi.width, self.roi.height
                ),
            });
        }
        self.edge.validate()?;
        self.segmentation.validate()?;
        self.morphology.validate()?;
        self.validate_threshold("min_area", self.min_area)?;
        if self.annotation_label.trim().is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "annotation_label must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::new(Roi::new(0, 0, 640, 480), PaintType::Black)
    }
}

/// How per-model confidences become voting weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// One weight per model from its mean confidence, applied everywhere.
    #[default]
    Global,
    /// Weights recomputed independently for every patch.
    PerPatch,
}

/// Where the spatial-association matrix for region fusion comes from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssociationMode {
    /// The caller passes the matrix with each run.
    #[default]
    Provided,
    /// Identity: region fusion leaves patch predictions unchanged.
    Identity,
    /// Non-negative cosine similarity of reconstructed patch features.
    FeatureSimilarity,
    /// Gaussian of the distance between patch grid cells.
    GridProximity { sigma: f32 },
}

/// Configuration of the multi-model fusion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Patch grid rows; `grid_rows * grid_cols` must equal the patch count.
    pub grid_rows: usize,
    /// Patch grid columns.
    pub grid_cols: usize,
    /// Multiplier applied to mean confidences before the softmax.
    #[serde(default = "FusionConfig::default_scale")]
    pub confidence_scale: f32,
    #[serde(default)]
    pub strategy: VotingStrategy,
    #[serde(default)]
    pub association: AssociationMode,
    /// Class taxonomy, indexed like the prediction channels.
    #[serde(default)]
    pub class_names: Option<Vec<String>>,
    /// Expected ensemble; empty disables the model-count check.
    #[serde(default)]
    pub models: Vec<ClassifierConfig>,
}

impl FusionConfig {
    pub fn new(grid_rows: usize, grid_cols: usize) -> Self {
        Self {
            grid_rows,
            grid_cols,
            confidence_scale: 1.0,
            strategy: VotingStrategy::Global,
            association: AssociationMode::Provided,
            class_names: None,
            models: Vec::new(),
        }
    }

    pub fn with_confidence_scale(mut self, scale: f32) -> Self {
        self.confidence_scale = scale;
        self
    }

    pub fn with_strategy(mut self, strategy: VotingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_association(mut self, association: AssociationMode) -> Self {
        self.association = association;
        self
    }

    pub fn with_class_names(mut self, names: Vec<String>) -> Self {
        self.class_names = Some(names);
        self
    }

    pub fn with_models(mut self, models: Vec<ClassifierConfig>) -> Self {
        self.models = models;
        self
    }

    fn default_scale() -> f32 {
        1.0
    }
}

impl ConfigValidator for FusionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive_count("grid_rows", self.grid_rows)?;
        self.validate_positive_count("grid_cols", self.grid_cols)?;
        if !self.confidence_scale.is_finite() || self.confidence_scale <= 0.0 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "confidence_scale must be positive, got {}",
                    self.confidence_scale
                ),
            });
        }
        if let AssociationMode::GridProximity { sigma } = self.association {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(ConfigError::InvalidConfig {
                    message: format!("grid proximity sigma must be positive, got {}", sigma),
                });
            }
        }
        if let Some(names) = &self.class_names {
            if names.is_empty() {
                return Err(ConfigError::InvalidConfig {
                    message: "class_names must not be empty when provided".to_string(),
                });
            }
        }
        for model in &self.models {
            model.validate()?;
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::new(14, 14).with_models(ClassifierConfig::ensemble_defaults())
    }
}

/// Top-level configuration for one inspection station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionConfig {
    pub preprocess: PreprocessConfig,
    pub fusion: FusionConfig,
    #[serde(default)]
    pub parallel: ParallelPolicy,
}

impl InspectionConfig {
    /// Loads and validates a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> InspectResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigValidator for InspectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.preprocess.validate()?;
        self.fusion.validate()?;
        self.parallel.validate()
    }

    fn get_defaults() -> Self {
        Self {
            preprocess: PreprocessConfig::get_defaults(),
            fusion: FusionConfig::get_defaults(),
            parallel: ParallelPolicy::default(),
        }
    }
}
