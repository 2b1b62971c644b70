//! Classifier configurations and the per-model tensors handed to fusion.
//!
//! The fusion stages never run a model. Each classifier's forward pass
//! happens elsewhere; its results arrive here as a [`ModelOutput`] and are
//! only read from then on.

use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::constants::DEFAULT_FEATURE_DIM;
use crate::core::validation::validate_non_empty;
use crate::core::{InspectError, InspectResult, Tensor2D, Tensor3D, Tensor4D};

/// Augmentation intensity applied when the classifier was trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AugmentationPreset {
    Light,
    Medium,
    Heavy,
}

/// One member of the classifier ensemble.
///
/// Members share an architecture and differ only in regularization, so a
/// single parametrized type describes all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Identifier used in logs and reports.
    pub name: String,
    /// Width of the patch features this model emits.
    pub feature_dim: usize,
    /// Dropout probability.
    pub drop_rate: f32,
    /// Stochastic-depth probability.
    pub drop_path_rate: f32,
    /// Training-time augmentation preset.
    pub augmentation: AugmentationPreset,
}

impl ClassifierConfig {
    pub fn new(name: impl Into<String>, feature_dim: usize) -> Self {
        Self {
            name: name.into(),
            feature_dim,
            drop_rate: 0.0,
            drop_path_rate: 0.0,
            augmentation: AugmentationPreset::Light,
        }
    }

    pub fn with_drop_rate(mut self, rate: f32) -> Self {
        self.drop_rate = rate;
        self
    }

    pub fn with_drop_path_rate(mut self, rate: f32) -> Self {
        self.drop_path_rate = rate;
        self
    }

    pub fn with_augmentation(mut self, preset: AugmentationPreset) -> Self {
        self.augmentation = preset;
        self
    }

    /// The three-member ensemble used on the inspection line.
    pub fn ensemble_defaults() -> Vec<ClassifierConfig> {
        vec![
            ClassifierConfig::new("vit-light", DEFAULT_FEATURE_DIM)
                .with_drop_path_rate(0.1)
                .with_augmentation(AugmentationPreset::Light),
            ClassifierConfig::new("vit-medium", DEFAULT_FEATURE_DIM)
                .with_drop_rate(0.1)
                .with_drop_path_rate(0.2)
                .with_augmentation(AugmentationPreset::Medium),
            ClassifierConfig::new("vit-heavy", DEFAULT_FEATURE_DIM)
                .with_drop_rate(0.2)
                .with_drop_path_rate(0.3)
                .with_augmentation(AugmentationPreset::Heavy),
        ]
    }
}

impl ConfigValidator for ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "classifier name must not be empty".to_string(),
            });
        }
        self.validate_positive_count("feature_dim", self.feature_dim)?;
        for (field, rate) in [
            ("drop_rate", self.drop_rate),
            ("drop_path_rate", self.drop_path_rate),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(ConfigError::InvalidConfig {
                    message: format!("{} of '{}' must be in [0, 1), got {}", field, self.name, rate),
                });
            }
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        ClassifierConfig::new("vit", DEFAULT_FEATURE_DIM)
    }
}

/// Everything one classifier produced for a batch of images.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Model identifier.
    pub name: String,
    /// Patch features `[batch, num_patches, feature_dim]`.
    pub features: Tensor3D,
    /// Per-patch class scores `[batch, num_patches, num_classes]`.
    pub predictions: Tensor3D,
    /// Per-patch confidence `[batch, num_patches]`.
    pub confidences: Tensor2D,
}

impl ModelOutput {
    pub fn new(
        name: impl Into<String>,
        features: Tensor3D,
        predictions: Tensor3D,
        confidences: Tensor2D,
    ) -> Self {
        Self {
            name: name.into(),
            features,
            predictions,
            confidences,
        }
    }

    pub fn feature_dim(&self) -> usize {
        self.features.dim().2
    }
}

/// Stacks per-model predictions into `[models, batch, patches, classes]` and
/// confidences into `[models, batch, patches]`.
///
/// All models must agree on batch size, patch count and class taxonomy.
pub fn stack_model_outputs(outputs: &[ModelOutput]) -> InspectResult<(Tensor4D, Tensor3D)> {
    validate_non_empty(outputs, "outputs")?;
    let (batch, patches, classes) = outputs[0].predictions.dim();

    for output in outputs {
        if output.predictions.dim() != (batch, patches, classes) {
            return Err(InspectError::shape_mismatch(
                "stack_model_outputs",
                &format!("{}.predictions", output.name),
                &format!("[{}, {}, {}]", batch, patches, classes),
                output.predictions.shape(),
            ));
        }
        if output.confidences.dim() != (batch, patches) {
            return Err(InspectError::shape_mismatch(
                "stack_model_outputs",
                &format!("{}.confidences", output.name),
                &format!("[{}, {}]", batch, patches),
                output.confidences.shape(),
            ));
        }
    }

    let prediction_views: Vec<_> = outputs
        .iter()
        .map(|o| o.predictions.view().insert_axis(Axis(0)))
        .collect();
    let confidence_views: Vec<_> = outputs
        .iter()
        .map(|o| o.confidences.view().insert_axis(Axis(0)))
        .collect();

    let predictions = ndarray::concatenate(Axis(0), &prediction_views)?;
    let confidences = ndarray::concatenate(Axis(0), &confidence_views)?;
    Ok((predictions, confidences))
}
