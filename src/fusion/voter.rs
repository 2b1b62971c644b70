//! Confidence-weighted voting across models.
//!
//! With [`VotingStrategy::Global`] each model's confidences are averaged over
//! batch and patch axes, multiplied by the confidence scale and softmaxed
//! into one weight per model. A model that is locally unreliable still
//! contributes at its global weight everywhere.
//!
//! [`VotingStrategy::PerPatch`] softmaxes the scaled confidences across
//! models independently at every `(batch, patch)` position instead.

use ndarray::{ArrayView1, Axis, Zip};
use tracing::{debug, warn};

use crate::core::config::VotingStrategy;
use crate::core::validation::{validate_finite_tensor, validate_non_degenerate_shape};
use crate::core::{InspectError, InspectResult, Tensor1D, Tensor3D, Tensor4D};

/// Result of one vote.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    /// Fused predictions `[batch, patches, classes]`.
    pub fused: Tensor3D,
    /// One weight per model, summing to 1. For per-patch voting this is the
    /// mean of the per-patch weights.
    pub model_weights: Tensor1D,
    /// Per-patch weights `[models, batch, patches]`, only for per-patch voting.
    pub patch_weights: Option<Tensor3D>,
}

/// Combines per-model predictions using confidence-derived weights.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceVoter {
    strategy: VotingStrategy,
    confidence_scale: f32,
}

impl Default for ConfidenceVoter {
    fn default() -> Self {
        Self {
            strategy: VotingStrategy::Global,
            confidence_scale: 1.0,
        }
    }
}

impl ConfidenceVoter {
    /// # Errors
    ///
    /// `InvalidArgument` when `confidence_scale` is not a positive finite number.
    pub fn new(strategy: VotingStrategy, confidence_scale: f32) -> InspectResult<Self> {
        if !confidence_scale.is_finite() || confidence_scale <= 0.0 {
            return Err(InspectError::invalid_argument(format!(
                "confidence_scale must be positive, got {}",
                confidence_scale
            )));
        }
        Ok(Self {
            strategy,
            confidence_scale,
        })
    }

    pub fn strategy(&self) -> VotingStrategy {
        self.strategy
    }

    /// Global model weights from `[models, batch, patches]` confidences.
    pub fn model_weights(&self, confidences: &Tensor3D) -> InspectResult<Tensor1D> {
        validate_non_degenerate_shape(confidences.shape(), "confidences")?;
        validate_finite_tensor(confidences, "confidences")?;
        let scaled: Tensor1D = confidences
            .outer_iter()
            .map(|model| model.mean().unwrap_or(0.0) * self.confidence_scale)
            .collect();
        Ok(softmax(scaled.view()))
    }

    /// Fuses `[models, batch, patches, classes]` predictions.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the two tensors disagree on the model, batch
    /// or patch axes, either has an empty axis, or either holds non-finite values.
    /// Confidences outside `[0, 1]` are accepted with a warning.
    pub fn vote(&self, predictions: &Tensor4D, confidences: &Tensor3D) -> InspectResult<VoteOutcome> {
        validate_non_degenerate_shape(predictions.shape(), "predictions")?;
        validate_finite_tensor(predictions, "predictions")?;
        validate_finite_tensor(confidences, "confidences")?;
        let (models, batch, patches, classes) = predictions.dim();
        if confidences.dim() != (models, batch, patches) {
            return Err(InspectError::shape_mismatch(
                "ConfidenceVoter",
                "confidences",
                &format!("[{}, {}, {}]", models, batch, patches),
                confidences.shape(),
            ));
        }
        let outside = count_outside_unit_range(confidences);
        if outside > 0 {
            warn!(
                outside,
                total = confidences.len(),
                "confidences outside [0, 1]; upstream models may be reporting logits"
            );
        }

        let outcome = match self.strategy {
            VotingStrategy::Global => {
                let weights = self.model_weights(confidences)?;
                let mut fused = Tensor3D::zeros((batch, patches, classes));
                for (model, &w) in predictions.outer_iter().zip(weights.iter()) {
                    fused.scaled_add(w, &model);
                }
                VoteOutcome {
                    fused,
                    model_weights: weights,
                    patch_weights: None,
                }
            }
            VotingStrategy::PerPatch => {
                let mut patch_weights = confidences.mapv(|c| c * self.confidence_scale);
                for mut lane in patch_weights.lanes_mut(Axis(0)) {
                    let normalized = softmax(lane.view());
                    lane.assign(&normalized);
                }

                let mut fused = Tensor3D::zeros((batch, patches, classes));
                for (model, weights) in predictions.outer_iter().zip(patch_weights.outer_iter()) {
                    Zip::from(fused.lanes_mut(Axis(2)))
                        .and(model.lanes(Axis(2)))
                        .and(&weights)
                        .for_each(|mut out, scores, &w| out.scaled_add(w, &scores));
                }

                let cells = (batch * patches) as f32;
                let model_weights = patch_weights
                    .outer_iter()
                    .map(|w| w.sum() / cells)
                    .collect();
                VoteOutcome {
                    fused,
                    model_weights,
                    patch_weights: Some(patch_weights),
                }
            }
        };

        debug!(
            strategy = ?self.strategy,
            weights = ?outcome.model_weights.to_vec(),
            "confidence vote complete"
        );
        Ok(outcome)
    }
}

fn count_outside_unit_range(confidences: &Tensor3D) -> usize {
    confidences
        .iter()
        .filter(|c| !(0.0..=1.0).contains(*c))
        .count()
}

/// Numerically stable softmax.
fn softmax(values: ArrayView1<f32>) -> Tensor1D {
    let max = values.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp = values.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    /// Three models over one image of `patches` patches with constant confidences.
    fn confidences(levels: [f32; 3], patches: usize) -> Array3<f32> {
        Array3::from_shape_fn((3, 1, patches), |(m, _, _)| levels[m])
    }

    /// Model `m` predicts class `m` with certainty everywhere.
    fn one_hot_predictions(patches: usize) -> Array4<f32> {
        Array4::from_shape_fn((3, 1, patches, 3), |(m, _, _, c)| if m == c { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_weights_sum_to_one() {
        for (levels, scale) in [
            ([0.9, 0.05, 0.05], 1.0),
            ([1000.0, -50.0, 3.0], 1.0),
            ([0.2, 0.2, 0.2], 50.0),
            ([1e-6, 0.0, 1.0], 1e4),
        ] {
            let voter = ConfidenceVoter::new(VotingStrategy::Global, scale).unwrap();
            let weights = voter.model_weights(&confidences(levels, 4)).unwrap();
            assert!((weights.sum() - 1.0).abs() < 1e-5, "{:?}", weights);
            assert!(weights.iter().all(|w| w.is_finite()));
        }
    }

    #[test]
    fn test_skewed_confidences_with_scaling_are_sharp() {
        let voter = ConfidenceVoter::new(VotingStrategy::Global, 20.0).unwrap();
        let weights = voter.model_weights(&confidences([0.9, 0.05, 0.05], 8)).unwrap();
        assert!(weights[0] > 0.999, "{:?}", weights);
        assert!(weights[1] < 1e-3 && weights[2] < 1e-3);
    }

    #[test]
    fn test_unscaled_skew_stays_soft() {
        let weights = ConfidenceVoter::default()
            .model_weights(&confidences([0.9, 0.05, 0.05], 8))
            .unwrap();
        assert!(weights[0] < 0.6, "{:?}", weights);
        assert!(weights[0] > weights[1]);
    }

    #[test]
    fn test_near_uniform_confidences_give_near_equal_weights() {
        let weights = ConfidenceVoter::default()
            .model_weights(&confidences([0.50, 0.52, 0.48], 8))
            .unwrap();
        for w in weights.iter() {
            assert!((w - 1.0 / 3.0).abs() < 0.01, "{:?}", weights);
        }
    }

    #[test]
    fn test_dominant_model_prediction_wins() {
        let voter = ConfidenceVoter::new(VotingStrategy::Global, 100.0).unwrap();
        let outcome = voter
            .vote(&one_hot_predictions(4), &confidences([0.99, 0.01, 0.01], 4))
            .unwrap();
        for lane in outcome.fused.lanes(Axis(2)) {
            assert!((lane[0] - 1.0).abs() < 1e-6);
            assert!(lane[1].abs() < 1e-6 && lane[2].abs() < 1e-6);
        }
        assert!(outcome.patch_weights.is_none());
    }

    #[test]
    fn test_out_of_range_confidences_are_counted_but_accepted() {
        assert_eq!(count_outside_unit_range(&confidences([0.0, 0.5, 1.0], 4)), 0);

        let logits = confidences([3.2, -1.0, 0.4], 4);
        assert_eq!(count_outside_unit_range(&logits), 8);
        let outcome = ConfidenceVoter::default()
            .vote(&one_hot_predictions(4), &logits)
            .unwrap();
        assert!((outcome.model_weights.sum() - 1.0).abs() < 1e-5);
        assert!(outcome.model_weights[0] > outcome.model_weights[2]);
    }

    #[test]
    fn test_global_weights_ignore_local_reliability() {
        // model 0 is confident on patch 0 only, model 1 on patch 1 only
        let mut conf = Array3::zeros((2, 1, 2));
        conf[[0, 0, 0]] = 1.0;
        conf[[1, 0, 1]] = 1.0;
        let preds = Array4::from_shape_fn((2, 1, 2, 2), |(m, _, _, c)| if m == c { 1.0 } else { 0.0 });

        let global = ConfidenceVoter::new(VotingStrategy::Global, 10.0)
            .unwrap()
            .vote(&preds, &conf)
            .unwrap();
        assert!((global.fused[[0, 0, 0]] - 0.5).abs() < 1e-6);
        assert!((global.fused[[0, 1, 0]] - 0.5).abs() < 1e-6);

        let local = ConfidenceVoter::new(VotingStrategy::PerPatch, 10.0)
            .unwrap()
            .vote(&preds, &conf)
            .unwrap();
        assert!(local.fused[[0, 0, 0]] > 0.99);
        assert!(local.fused[[0, 1, 1]] > 0.99);
        let patch_weights = local.patch_weights.unwrap();
        for lane in patch_weights.lanes(Axis(0)) {
            assert!((lane.sum() - 1.0).abs() < 1e-5);
        }
        assert!((local.model_weights.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = ConfidenceVoter::default()
            .vote(&one_hot_predictions(4), &confidences([0.3, 0.3, 0.3], 5))
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));
    }

    #[test]
    fn test_non_finite_confidence_rejected() {
        let mut conf = confidences([0.3, 0.3, 0.3], 4);
        conf[[1, 0, 2]] = f32::INFINITY;
        assert!(ConfidenceVoter::default().vote(&one_hot_predictions(4), &conf).is_err());
    }

    #[test]
    fn test_invalid_scale_rejected() {
        assert!(ConfidenceVoter::new(VotingStrategy::Global, 0.0).is_err());
        assert!(ConfidenceVoter::new(VotingStrategy::Global, f32::NAN).is_err());
    }
}
