//! Cross-model feature alignment by scaled dot-product attention.
//!
//! The first model's patch features act as the query. Every other model's
//! features are concatenated along the patch axis into one key/value pool,
//! and each query patch is replaced by the softmax-weighted mixture of the
//! pool, `softmax(Q · Kᵀ / √D) · K`.
//!
//! Pool members must share the query's feature dimension. A model with a
//! different dimension needs an explicit [`FeatureProjection`] registered
//! for its index; mismatches are never coerced.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView2, ArrayView3, Axis, s};
use tracing::debug;

use crate::core::validation::{validate_finite_tensor, validate_non_degenerate_shape};
use crate::core::{InspectError, InspectResult, Tensor3D};

/// Linear map from one model's feature space into the query's.
#[derive(Debug, Clone)]
pub struct FeatureProjection {
    /// `[input_dim, output_dim]`.
    weights: Array2<f32>,
    bias: Option<Array1<f32>>,
}

impl FeatureProjection {
    /// Creates a projection `x · W + b`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `weights` has an empty axis, contains
    /// non-finite values, or `bias` does not match the output dimension.
    pub fn new(weights: Array2<f32>, bias: Option<Array1<f32>>) -> InspectResult<Self> {
        validate_non_degenerate_shape(weights.shape(), "projection.weights")?;
        validate_finite_tensor(&weights, "projection.weights")?;
        if let Some(b) = &bias {
            if b.len() != weights.ncols() {
                return Err(InspectError::shape_mismatch(
                    "FeatureProjection",
                    "bias",
                    &format!("[{}]", weights.ncols()),
                    b.shape(),
                ));
            }
            validate_finite_tensor(b, "projection.bias")?;
        }
        Ok(Self { weights, bias })
    }

    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.ncols()
    }

    /// Projects `[batch, patches, input_dim]` to `[batch, patches, output_dim]`.
    pub fn apply(&self, features: ArrayView3<f32>) -> Tensor3D {
        let (batch, patches, _) = features.dim();
        let mut out = Tensor3D::zeros((batch, patches, self.output_dim()));
        for (src, mut dst) in features.outer_iter().zip(out.outer_iter_mut()) {
            let mut projected = src.dot(&self.weights);
            if let Some(bias) = &self.bias {
                projected += bias;
            }
            dst.assign(&projected);
        }
        out
    }
}

/// Aligns several models' patch features onto the first model's.
#[derive(Debug, Clone, Default)]
pub struct CrossModelAligner {
    projections: BTreeMap<usize, FeatureProjection>,
}

impl CrossModelAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a projection for the model at `model_index` (1-based pool member).
    pub fn with_projection(mut self, model_index: usize, projection: FeatureProjection) -> Self {
        self.projections.insert(model_index, projection);
        self
    }

    /// Aligns `features` (one `[batch, patches, dim]` tensor per model).
    ///
    /// Returns a tensor shaped exactly like `features[0]`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when fewer than two models are given, batch sizes
    /// differ, a tensor has an empty axis or non-finite values, a projection
    /// is registered for the query model, or a pool member's dimension
    /// differs from the query's without a matching projection.
    pub fn align(&self, features: &[Tensor3D]) -> InspectResult<Tensor3D> {
        if features.len() < 2 {
            return Err(InspectError::invalid_argument(format!(
                "alignment needs at least two models, got {}",
                features.len()
            )));
        }
        if self.projections.contains_key(&0) {
            return Err(InspectError::invalid_argument(
                "model 0 is the alignment query and cannot be projected",
            ));
        }

        let query = &features[0];
        validate_non_degenerate_shape(query.shape(), "features[0]")?;
        validate_finite_tensor(query, "features[0]")?;
        let (batch, _, dim) = query.dim();

        let mut pool_members = Vec::with_capacity(features.len() - 1);
        for (index, member) in features.iter().enumerate().skip(1) {
            let name = format!("features[{}]", index);
            validate_non_degenerate_shape(member.shape(), &name)?;
            validate_finite_tensor(member, &name)?;
            if member.dim().0 != batch {
                return Err(InspectError::shape_mismatch(
                    "CrossModelAligner",
                    &name,
                    &format!("batch size {}", batch),
                    member.shape(),
                ));
            }
            pool_members.push(self.project_member(index, member, dim)?);
        }

        let views: Vec<ArrayView3<f32>> = pool_members.iter().map(|m| m.view()).collect();
        let pool = ndarray::concatenate(Axis(1), &views)?;
        debug!(
            models = features.len(),
            pool_patches = pool.dim().1,
            dim,
            "aligning model features"
        );

        let scale = 1.0 / (dim as f32).sqrt();
        let mut aligned = Tensor3D::zeros(query.raw_dim());
        for b in 0..batch {
            let q = query.slice(s![b, .., ..]);
            let kv = pool.slice(s![b, .., ..]);
            let weights = attention_weights(q, kv, scale);
            aligned.slice_mut(s![b, .., ..]).assign(&weights.dot(&kv));
        }
        Ok(aligned)
    }

    fn project_member(&self, index: usize, member: &Tensor3D, dim: usize) -> InspectResult<Tensor3D> {
        let member_dim = member.dim().2;
        match self.projections.get(&index) {
            Some(projection) => {
                if projection.input_dim() != member_dim || projection.output_dim() != dim {
                    return Err(InspectError::invalid_argument(format!(
                        "projection for model {} maps {} -> {}, but features are {} -> {}",
                        index,
                        projection.input_dim(),
                        projection.output_dim(),
                        member_dim,
                        dim
                    )));
                }
                Ok(projection.apply(member.view()))
            }
            None if member_dim == dim => Ok(member.clone()),
            None => Err(InspectError::invalid_argument(format!(
                "model {} has feature dimension {} but the query has {}; register a FeatureProjection",
                index, member_dim, dim
            ))),
        }
    }
}

/// Row-wise softmax of `q · kᵀ · scale`.
fn attention_weights(q: ArrayView2<f32>, k: ArrayView2<f32>, scale: f32) -> Array2<f32> {
    let mut scores = q.dot(&k.t());
    scores.mapv_inplace(|v| v * scale);
    for mut row in scores.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    scores
}
