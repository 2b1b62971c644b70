//! Spatial reconstruction of patch features over a 2-D grid.

use ndarray::{Array4, Axis};
use tracing::debug;

use crate::core::validation::validate_non_degenerate_shape;
use crate::core::{InspectError, InspectResult, Tensor3D};

/// Grid-shaped features with row and column context.
#[derive(Debug, Clone)]
pub struct SpatialFeatureMap {
    /// Sum over each grid row, `[batch, rows, dim]`.
    pub row_context: Tensor3D,
    /// Sum over each grid column, `[batch, cols, dim]`.
    pub col_context: Tensor3D,
    /// `row_context[r] + col_context[c]` at every cell, `[batch, rows, cols, dim]`.
    pub combined: Array4<f32>,
}

impl SpatialFeatureMap {
    pub fn rows(&self) -> usize {
        self.combined.dim().1
    }

    pub fn cols(&self) -> usize {
        self.combined.dim().2
    }

    /// Flattens the combined map back to `[batch, rows * cols, dim]`, row-major.
    pub fn flatten(&self) -> InspectResult<Tensor3D> {
        let (batch, rows, cols, dim) = self.combined.dim();
        let flat = self
            .combined
            .to_shape((batch, rows * cols, dim))?
            .into_owned();
        Ok(flat)
    }
}

/// Reshapes flat patch sequences onto a fixed grid.
#[derive(Debug, Clone, Copy)]
pub struct SpatialReconstructor {
    rows: usize,
    cols: usize,
}

impl SpatialReconstructor {
    /// # Errors
    ///
    /// `InvalidArgument` when either grid side is zero.
    pub fn new(rows: usize, cols: usize) -> InspectResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(InspectError::invalid_argument(format!(
                "grid must have at least one row and column, got {}x{}",
                rows, cols
            )));
        }
        Ok(Self { rows, cols })
    }

    pub fn grid(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn num_patches(&self) -> usize {
        self.rows * self.cols
    }

    /// Reconstructs the grid from `[batch, patches, dim]` features.
    ///
    /// Patch `n` sits at row `n / cols`, column `n % cols`. The row response
    /// is a 1×cols sum filter, the column response a rows×1 sum filter, and
    /// their sum is broadcast back to every cell.
    ///
    /// # Errors
    ///
    /// `Degenerate` when `rows * cols` differs from the patch count.
    pub fn reconstruct(&self, features: &Tensor3D) -> InspectResult<SpatialFeatureMap> {
        validate_non_degenerate_shape(features.shape(), "aligned features")?;
        let (batch, patches, dim) = features.dim();
        if patches != self.num_patches() {
            return Err(InspectError::degenerate(format!(
                "grid {}x{} covers {} patches, but features have {}",
                self.rows,
                self.cols,
                self.num_patches(),
                patches
            )));
        }

        let grid = features.to_shape((batch, self.rows, self.cols, dim))?;
        let row_context = grid.sum_axis(Axis(2));
        let col_context = grid.sum_axis(Axis(1));
        let combined = &row_context.view().insert_axis(Axis(2)) + &col_context.view().insert_axis(Axis(1));

        debug!(rows = self.rows, cols = self.cols, dim, "spatial map reconstructed");
        Ok(SpatialFeatureMap {
            row_context,
            col_context,
            combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn sequence(patches: usize) -> Tensor3D {
        Array3::from_shape_fn((1, patches, 1), |(_, n, _)| (n + 1) as f32)
    }

    #[test]
    fn test_row_and_column_sums() {
        // grid [[1, 2, 3], [4, 5, 6]]
        let map = SpatialReconstructor::new(2, 3)
            .unwrap()
            .reconstruct(&sequence(6))
            .unwrap();
        assert_eq!(map.row_context.iter().copied().collect::<Vec<_>>(), vec![6.0, 15.0]);
        assert_eq!(map.col_context.iter().copied().collect::<Vec<_>>(), vec![5.0, 7.0, 9.0]);
        assert_eq!(map.combined[[0, 0, 0, 0]], 11.0);
        assert_eq!(map.combined[[0, 1, 2, 0]], 24.0);
        assert_eq!(map.combined[[0, 1, 0, 0]], 20.0);
    }

    #[test]
    fn test_flatten_keeps_row_major_order() {
        let map = SpatialReconstructor::new(2, 2)
            .unwrap()
            .reconstruct(&sequence(4))
            .unwrap();
        let flat = map.flatten().unwrap();
        assert_eq!(flat.dim(), (1, 4, 1));
        assert_eq!(flat[[0, 1, 0]], map.combined[[0, 0, 1, 0]]);
        assert_eq!(flat[[0, 2, 0]], map.combined[[0, 1, 0, 0]]);
    }

    #[test]
    fn test_mismatched_grid_is_degenerate() {
        let err = SpatialReconstructor::new(3, 3)
            .unwrap()
            .reconstruct(&sequence(8))
            .unwrap_err();
        assert!(matches!(err, InspectError::Degenerate { .. }));
    }

    #[test]
    fn test_zero_sized_grid_rejected() {
        assert!(SpatialReconstructor::new(0, 4).is_err());
    }

    #[test]
    fn test_batches_are_independent() {
        let mut features = Array3::zeros((2, 4, 2));
        features[[1, 3, 1]] = 1.0;
        let map = SpatialReconstructor::new(2, 2)
            .unwrap()
            .reconstruct(&features)
            .unwrap();
        assert!(map.combined.index_axis(Axis(0), 0).iter().all(|&v| v == 0.0));
        assert_eq!(map.combined[[1, 1, 1, 1]], 2.0);
        assert_eq!(map.combined[[1, 0, 0, 1]], 0.0);
        assert_eq!(map.rows(), 2);
        assert_eq!(map.cols(), 2);
    }
}
