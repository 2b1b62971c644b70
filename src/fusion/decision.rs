//! Multi-granularity decision fusion: patch → region → image.

use ndarray::{Axis, s};
use tracing::debug;

use crate::core::validation::{validate_finite_tensor, validate_non_degenerate_shape};
use crate::core::{InspectError, InspectResult, Tensor2D, Tensor3D};
use crate::domain::Verdict;

/// Region- and image-level predictions for a batch.
#[derive(Debug, Clone)]
pub struct DecisionOutput {
    /// Association-adjusted patch predictions `[batch, patches, classes]`.
    pub region_predictions: Tensor3D,
    /// Image-level class vectors `[batch, classes]`.
    pub global_predictions: Tensor2D,
    /// One verdict per image.
    pub verdicts: Vec<Verdict>,
}

/// Stateless reduction of fused patch predictions to per-image verdicts.
#[derive(Debug, Clone, Default)]
pub struct DecisionFusionEngine {
    class_names: Option<Vec<String>>,
}

impl DecisionFusionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_names(mut self, names: Vec<String>) -> Self {
        self.class_names = Some(names);
        self
    }

    /// Multiplies each image's association matrix `[patches, patches]`
    /// against its patch predictions `[patches, classes]`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the association is not `[batch, patches, patches]`
    /// for the given predictions, or either tensor is empty or non-finite.
    pub fn region_fusion(&self, predictions: &Tensor3D, association: &Tensor3D) -> InspectResult<Tensor3D> {
        validate_non_degenerate_shape(predictions.shape(), "patch predictions")?;
        validate_finite_tensor(predictions, "patch predictions")?;
        validate_finite_tensor(association, "association")?;
        let (batch, patches, classes) = predictions.dim();
        if association.dim() != (batch, patches, patches) {
            return Err(InspectError::shape_mismatch(
                "DecisionFusionEngine",
                "association",
                &format!("[{}, {}, {}]", batch, patches, patches),
                association.shape(),
            ));
        }

        let mut region = Tensor3D::zeros((batch, patches, classes));
        for b in 0..batch {
            let fused = association
                .slice(s![b, .., ..])
                .dot(&predictions.slice(s![b, .., ..]));
            region.slice_mut(s![b, .., ..]).assign(&fused);
        }
        Ok(region)
    }

    /// Averages region predictions over the patch axis.
    pub fn global_fusion(&self, region: &Tensor3D) -> InspectResult<Tensor2D> {
        region
            .mean_axis(Axis(1))
            .ok_or_else(|| InspectError::degenerate("cannot average over zero patches"))
    }

    /// Runs region then global fusion and derives one verdict per image.
    pub fn fuse(&self, predictions: &Tensor3D, association: &Tensor3D) -> InspectResult<DecisionOutput> {
        let region_predictions = self.region_fusion(predictions, association)?;
        let global_predictions = self.global_fusion(&region_predictions)?;

        let verdicts = global_predictions
            .outer_iter()
            .map(|row| {
                Verdict::from_probabilities(row.to_vec(), self.class_names.as_deref())
                    .ok_or_else(|| InspectError::degenerate("prediction vector has no classes"))
            })
            .collect::<InspectResult<Vec<_>>>()?;

        for (index, verdict) in verdicts.iter().enumerate() {
            debug!(
                image = index,
                label = verdict.label,
                confidence = verdict.confidence,
                "image verdict"
            );
        }

        Ok(DecisionOutput {
            region_predictions,
            global_predictions,
            verdicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::association::identity_association;
    use ndarray::{Array3, array};

    fn predictions() -> Tensor3D {
        Array3::from_shape_fn((2, 4, 3), |(b, n, c)| ((b + 1) * (n + c + 1)) as f32 / 10.0)
    }

    #[test]
    fn test_identity_association_leaves_predictions_unchanged() {
        let preds = predictions();
        let region = DecisionFusionEngine::new()
            .region_fusion(&preds, &identity_association(2, 4))
            .unwrap();
        assert_eq!(region, preds);
    }

    #[test]
    fn test_global_fusion_averages_patches() {
        let preds = array![[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 0.0]]];
        let out = DecisionFusionEngine::new()
            .fuse(&preds, &identity_association(1, 4))
            .unwrap();
        assert_eq!(out.global_predictions, array![[0.75, 0.25]]);
        assert_eq!(out.verdicts.len(), 1);
        assert_eq!(out.verdicts[0].label, 0);
        assert!((out.verdicts[0].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_association_spreads_evidence() {
        // patch 0 sees a defect; full averaging association spreads it evenly
        let preds = array![[[0.0, 1.0], [1.0, 0.0]]];
        let assoc = Array3::from_elem((1, 2, 2), 0.5);
        let region = DecisionFusionEngine::new().region_fusion(&preds, &assoc).unwrap();
        assert_eq!(region, array![[[0.5, 0.5], [0.5, 0.5]]]);
    }

    #[test]
    fn test_class_names_in_verdict() {
        let engine = DecisionFusionEngine::new()
            .with_class_names(vec!["ok".to_string(), "scratch".to_string()]);
        let preds = array![[[0.1, 0.9], [0.3, 0.7]]];
        let out = engine.fuse(&preds, &identity_association(1, 2)).unwrap();
        assert_eq!(out.verdicts[0].label_name.as_deref(), Some("scratch"));
    }

    #[test]
    fn test_association_shape_mismatch_rejected() {
        let err = DecisionFusionEngine::new()
            .region_fusion(&predictions(), &identity_association(2, 3))
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));
    }
}
