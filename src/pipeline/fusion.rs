//! The multi-model fusion pipeline.
//!
//! Model outputs → feature alignment → spatial reconstruction →
//! confidence voting → region and global decision fusion.

use tracing::{debug, info, warn};

use crate::core::config::{AssociationMode, ConfigValidator, FusionConfig};
use crate::core::validation::validate_axes_match;
use crate::core::{InspectError, InspectResult, Tensor1D, Tensor2D, Tensor3D};
use crate::domain::{ModelOutput, Verdict, stack_model_outputs};
use crate::fusion::{
    ConfidenceVoter, CrossModelAligner, DecisionFusionEngine, FeatureProjection,
    SpatialFeatureMap, SpatialReconstructor, feature_similarity_association,
    grid_proximity_association, identity_association,
};

/// Everything the fusion pipeline computed for one batch.
#[derive(Debug, Clone)]
pub struct FusionReport {
    /// Aligned features `[batch, patches, dim_of_model_0]`.
    pub aligned: Tensor3D,
    /// Grid-structured view of the aligned features.
    pub spatial: SpatialFeatureMap,
    /// Per-model voting weights.
    pub model_weights: Tensor1D,
    /// Voted patch predictions `[batch, patches, classes]`.
    pub fused_predictions: Tensor3D,
    /// Association matrix used for region fusion.
    pub association: Tensor3D,
    /// Region-level predictions `[batch, patches, classes]`.
    pub region_predictions: Tensor3D,
    /// Image-level class vectors `[batch, classes]`.
    pub global_predictions: Tensor2D,
    /// One verdict per image.
    pub verdicts: Vec<Verdict>,
}

/// Fuses precomputed model outputs into per-image verdicts.
#[derive(Debug, Clone)]
pub struct FusionPipeline {
    config: FusionConfig,
    aligner: CrossModelAligner,
    reconstructor: SpatialReconstructor,
    voter: ConfidenceVoter,
    engine: DecisionFusionEngine,
}

impl FusionPipeline {
    pub fn new(config: FusionConfig) -> InspectResult<Self> {
        config.validate()?;
        let reconstructor = SpatialReconstructor::new(config.grid_rows, config.grid_cols)?;
        let voter = ConfidenceVoter::new(config.strategy, config.confidence_scale)?;
        let engine = match &config.class_names {
            Some(names) => DecisionFusionEngine::new().with_class_names(names.clone()),
            None => DecisionFusionEngine::new(),
        };
        Ok(Self {
            config,
            aligner: CrossModelAligner::new(),
            reconstructor,
            voter,
            engine,
        })
    }

    /// Registers a projection for the model at `model_index`.
    pub fn with_projection(mut self, model_index: usize, projection: FeatureProjection) -> Self {
        self.aligner = self.aligner.with_projection(model_index, projection);
        self
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Runs the fusion stages.
    ///
    /// `association` is required with [`AssociationMode::Provided`] and
    /// ignored otherwise.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for any shape or count mismatch against the configured
    /// ensemble, a missing association, or a failing stage check;
    /// `Degenerate` when the grid does not cover the patch count.
    pub fn run(&self, outputs: &[ModelOutput], association: Option<&Tensor3D>) -> InspectResult<FusionReport> {
        self.check_ensemble(outputs)?;

        let features: Vec<Tensor3D> = outputs.iter().map(|o| o.features.clone()).collect();
        let aligned = self.aligner.align(&features)?;
        let spatial = self.reconstructor.reconstruct(&aligned)?;

        let (predictions, confidences) = stack_model_outputs(outputs)?;
        let (batch, patches) = (aligned.dim().0, aligned.dim().1);
        let expected = [outputs.len(), batch, patches, predictions.dim().3];
        validate_axes_match("FusionPipeline", "predictions", predictions.shape(), &expected, &[1, 2])?;
        let vote = self.voter.vote(&predictions, &confidences)?;

        let association = self.resolve_association(association, &spatial, batch, patches)?;
        let decision = self.engine.fuse(&vote.fused, &association)?;

        info!(
            models = outputs.len(),
            batch,
            patches,
            verdicts = ?decision.verdicts.iter().map(|v| v.label).collect::<Vec<_>>(),
            "fusion complete"
        );

        Ok(FusionReport {
            aligned,
            spatial,
            model_weights: vote.model_weights,
            fused_predictions: vote.fused,
            association,
            region_predictions: decision.region_predictions,
            global_predictions: decision.global_predictions,
            verdicts: decision.verdicts,
        })
    }

    fn check_ensemble(&self, outputs: &[ModelOutput]) -> InspectResult<()> {
        let expected = &self.config.models;
        if expected.is_empty() {
            return Ok(());
        }
        if outputs.len() != expected.len() {
            return Err(InspectError::invalid_argument(format!(
                "expected outputs from {} models, got {}",
                expected.len(),
                outputs.len()
            )));
        }
        for (output, model) in outputs.iter().zip(expected) {
            if output.feature_dim() != model.feature_dim {
                return Err(InspectError::invalid_argument(format!(
                    "model '{}' is configured with {} features but '{}' produced {}",
                    model.name,
                    model.feature_dim,
                    output.name,
                    output.feature_dim()
                )));
            }
        }
        Ok(())
    }

    fn resolve_association(
        &self,
        provided: Option<&Tensor3D>,
        spatial: &SpatialFeatureMap,
        batch: usize,
        patches: usize,
    ) -> InspectResult<Tensor3D> {
        if provided.is_some() && self.config.association != AssociationMode::Provided {
            warn!(mode = ?self.config.association, "ignoring caller association matrix");
        }
        let association = match &self.config.association {
            AssociationMode::Provided => provided.cloned().ok_or_else(|| {
                InspectError::invalid_argument(
                    "association mode 'provided' needs an association matrix",
                )
            })?,
            AssociationMode::Identity => identity_association(batch, patches),
            AssociationMode::FeatureSimilarity => {
                feature_similarity_association(&spatial.flatten()?)?
            }
            AssociationMode::GridProximity { sigma } => grid_proximity_association(
                batch,
                self.config.grid_rows,
                self.config.grid_cols,
                *sigma,
            )?,
        };
        debug!(mode = ?self.config.association, "association resolved");
        Ok(association)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::VotingStrategy;
    use crate::domain::ClassifierConfig;
    use ndarray::{Array2, Array3};

    const ROWS: usize = 2;
    const COLS: usize = 3;
    const PATCHES: usize = ROWS * COLS;

    /// Model predicting `class` everywhere with a flat confidence.
    fn output(name: &str, dim: usize, class: usize, confidence: f32) -> ModelOutput {
        ModelOutput::new(
            name,
            Array3::from_shape_fn((1, PATCHES, dim), |(_, n, d)| ((n + d) as f32 * 0.3).cos()),
            Array3::from_shape_fn((1, PATCHES, 3), |(_, _, c)| if c == class { 1.0 } else { 0.0 }),
            Array2::from_elem((1, PATCHES), confidence),
        )
    }

    fn ensemble() -> Vec<ModelOutput> {
        vec![
            output("vit-light", 8, 2, 0.95),
            output("vit-medium", 8, 1, 0.05),
            output("vit-heavy", 8, 1, 0.05),
        ]
    }

    fn config() -> FusionConfig {
        FusionConfig::new(ROWS, COLS)
            .with_confidence_scale(20.0)
            .with_association(AssociationMode::Identity)
            .with_class_names(vec!["ok".into(), "scratch".into(), "pinhole".into()])
    }

    #[test]
    fn test_confident_model_decides_verdict() {
        let report = FusionPipeline::new(config()).unwrap().run(&ensemble(), None).unwrap();
        assert_eq!(report.aligned.dim(), (1, PATCHES, 8));
        assert_eq!(report.spatial.combined.dim(), (1, ROWS, COLS, 8));
        assert!((report.model_weights.sum() - 1.0).abs() < 1e-5);
        assert_eq!(report.verdicts.len(), 1);
        assert_eq!(report.verdicts[0].label, 2);
        assert_eq!(report.verdicts[0].label_name.as_deref(), Some("pinhole"));
    }

    #[test]
    fn test_identity_region_matches_fused() {
        let report = FusionPipeline::new(config()).unwrap().run(&ensemble(), None).unwrap();
        assert_eq!(report.region_predictions, report.fused_predictions);
    }

    #[test]
    fn test_provided_association_required() {
        let config = config().with_association(AssociationMode::Provided);
        let pipeline = FusionPipeline::new(config).unwrap();
        let err = pipeline.run(&ensemble(), None).unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));

        let assoc = identity_association(1, PATCHES);
        assert!(pipeline.run(&ensemble(), Some(&assoc)).is_ok());
    }

    #[test]
    fn test_built_associations_are_accepted() {
        for mode in [
            AssociationMode::FeatureSimilarity,
            AssociationMode::GridProximity { sigma: 1.0 },
        ] {
            let report = FusionPipeline::new(config().with_association(mode))
                .unwrap()
                .run(&ensemble(), None)
                .unwrap();
            assert_eq!(report.association.dim(), (1, PATCHES, PATCHES));
            // every patch carries the same prediction, so any row-stochastic mix keeps it
            assert_eq!(report.verdicts[0].label, 2);
        }
    }

    #[test]
    fn test_grid_mismatch_is_degenerate() {
        let err = FusionPipeline::new(FusionConfig::new(3, 3).with_association(AssociationMode::Identity))
            .unwrap()
            .run(&ensemble(), None)
            .unwrap_err();
        assert!(matches!(err, InspectError::Degenerate { .. }));
    }

    #[test]
    fn test_configured_ensemble_is_enforced() {
        let models = vec![
            ClassifierConfig::new("vit-light", 8),
            ClassifierConfig::new("vit-medium", 8),
        ];
        let err = FusionPipeline::new(config().with_models(models))
            .unwrap()
            .run(&ensemble(), None)
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));

        let models = vec![
            ClassifierConfig::new("vit-light", 8),
            ClassifierConfig::new("vit-medium", 8),
            ClassifierConfig::new("vit-heavy", 16),
        ];
        let err = FusionPipeline::new(config().with_models(models))
            .unwrap()
            .run(&ensemble(), None)
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));
    }

    #[test]
    fn test_projection_enables_mixed_dimensions() {
        let mut outputs = ensemble();
        outputs[2] = output("vit-wide", 12, 1, 0.05);
        let pipeline = FusionPipeline::new(config()).unwrap();
        assert!(pipeline.run(&outputs, None).is_err());

        let projection = FeatureProjection::new(Array2::from_elem((12, 8), 0.05), None).unwrap();
        let report = pipeline
            .with_projection(2, projection)
            .run(&outputs, None)
            .unwrap();
        assert_eq!(report.aligned.dim(), (1, PATCHES, 8));
    }

    #[test]
    fn test_predictions_must_cover_feature_patches() {
        let outputs: Vec<ModelOutput> = ensemble()
            .into_iter()
            .map(|mut o| {
                o.predictions = Array3::from_elem((1, PATCHES + 1, 3), 1.0 / 3.0);
                o.confidences = Array2::from_elem((1, PATCHES + 1), 0.5);
                o
            })
            .collect();
        let err = FusionPipeline::new(config()).unwrap().run(&outputs, None).unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));
        assert!(err.to_string().contains("predictions"));
    }

    #[test]
    fn test_per_patch_strategy_runs() {
        let report = FusionPipeline::new(config().with_strategy(VotingStrategy::PerPatch))
            .unwrap()
            .run(&ensemble(), None)
            .unwrap();
        assert_eq!(report.verdicts[0].label, 2);
    }
}
