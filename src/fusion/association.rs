//! Builders for spatial-association matrices `[batch, patches, patches]`.
//!
//! Every builder returns row-normalized matrices, so region fusion keeps
//! prediction magnitudes on the same scale as its input.

use ndarray::{Array2, Axis};

use crate::core::validation::{validate_finite_tensor, validate_non_degenerate_shape};
use crate::core::{InspectError, InspectResult, Tensor3D};

/// Identity association: region fusion returns patch predictions unchanged.
pub fn identity_association(batch: usize, patches: usize) -> Tensor3D {
    Tensor3D::from_shape_fn((batch, patches, patches), |(_, i, j)| {
        if i == j { 1.0 } else { 0.0 }
    })
}

/// Gaussian association over patch grid positions.
///
/// Patches `i` and `j` at grid cells `(r_i, c_i)`, `(r_j, c_j)` get weight
/// `exp(-d² / (2σ²))` with `d` the Euclidean cell distance, then each row is
/// normalized to sum to 1.
///
/// # Errors
///
/// `InvalidArgument` for an empty grid or a non-positive `sigma`.
pub fn grid_proximity_association(
    batch: usize,
    rows: usize,
    cols: usize,
    sigma: f32,
) -> InspectResult<Tensor3D> {
    if rows == 0 || cols == 0 {
        return Err(InspectError::invalid_argument(format!(
            "grid must be non-empty, got {}x{}",
            rows, cols
        )));
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(InspectError::invalid_argument(format!(
            "sigma must be positive, got {}",
            sigma
        )));
    }

    let patches = rows * cols;
    let denom = 2.0 * sigma * sigma;
    let mut kernel = Array2::from_shape_fn((patches, patches), |(i, j)| {
        let dr = (i / cols) as f32 - (j / cols) as f32;
        let dc = (i % cols) as f32 - (j % cols) as f32;
        (-(dr * dr + dc * dc) / denom).exp()
    });
    normalize_rows(&mut kernel);

    let mut out = Tensor3D::zeros((batch, patches, patches));
    for mut slice in out.outer_iter_mut() {
        slice.assign(&kernel);
    }
    Ok(out)
}

/// Association from patch-feature similarity.
///
/// Weight `i → j` is the cosine similarity of the two feature vectors,
/// clamped at zero; the diagonal is always 1 so zero vectors still
/// associate with themselves. Rows are normalized to sum to 1.
///
/// # Errors
///
/// `InvalidArgument` when `features` has an empty axis or non-finite values.
pub fn feature_similarity_association(features: &Tensor3D) -> InspectResult<Tensor3D> {
    validate_non_degenerate_shape(features.shape(), "features")?;
    validate_finite_tensor(features, "features")?;
    let (batch, patches, _) = features.dim();

    let mut out = Tensor3D::zeros((batch, patches, patches));
    for (sample, mut assoc) in features.outer_iter().zip(out.outer_iter_mut()) {
        let norms: Vec<f32> = sample
            .rows()
            .into_iter()
            .map(|row| row.dot(&row).sqrt())
            .collect();
        let gram = sample.dot(&sample.t());
        let mut sim = Array2::from_shape_fn((patches, patches), |(i, j)| {
            if i == j {
                return 1.0;
            }
            let denom = norms[i] * norms[j];
            if denom > f32::EPSILON {
                (gram[[i, j]] / denom).max(0.0)
            } else {
                0.0
            }
        });
        normalize_rows(&mut sim);
        assoc.assign(&sim);
    }
    Ok(out)
}

fn normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_row_stochastic(assoc: &Tensor3D) {
        for sample in assoc.outer_iter() {
            for row in sample.rows() {
                assert!((row.sum() - 1.0).abs() < 1e-5);
                assert!(row.iter().all(|&v| v >= 0.0));
            }
        }
    }

    #[test]
    fn test_identity() {
        let assoc = identity_association(2, 3);
        assert_eq!(assoc.dim(), (2, 3, 3));
        assert_eq!(assoc[[1, 2, 2]], 1.0);
        assert_eq!(assoc[[1, 0, 2]], 0.0);
    }

    #[test]
    fn test_grid_proximity_prefers_neighbours() {
        let assoc = grid_proximity_association(1, 3, 3, 1.0).unwrap();
        assert_row_stochastic(&assoc);
        // centre patch: direct neighbours outweigh corners
        assert!(assoc[[0, 4, 1]] > assoc[[0, 4, 0]]);
        assert!((assoc[[0, 4, 1]] - assoc[[0, 4, 3]]).abs() < 1e-6);
        // symmetric kernel before normalization, so the centre row is symmetric
        assert!((assoc[[0, 4, 0]] - assoc[[0, 4, 8]]).abs() < 1e-6);
    }

    #[test]
    fn test_grid_proximity_rejects_bad_sigma() {
        assert!(grid_proximity_association(1, 2, 2, 0.0).is_err());
        assert!(grid_proximity_association(1, 0, 2, 1.0).is_err());
    }

    #[test]
    fn test_feature_similarity() {
        let features = array![[[1.0, 0.0], [2.0, 0.0], [0.0, 1.0], [0.0, 0.0]]];
        let assoc = feature_similarity_association(&features).unwrap();
        assert_row_stochastic(&assoc);
        // parallel vectors associate equally with each other and themselves
        assert!((assoc[[0, 0, 1]] - 0.5).abs() < 1e-6);
        // orthogonal and zero vectors do not associate
        assert_eq!(assoc[[0, 0, 2]], 0.0);
        assert_eq!(assoc[[0, 3, 3]], 1.0);
    }
}
