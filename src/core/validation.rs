//! Input validation utilities.
//!
//! Shape and value checks shared by the fusion stages. Each helper returns
//! `InvalidArgument` instead of letting an indexing panic surface later.

use ndarray::{ArrayBase, Data, Dimension};

use crate::core::{InspectError, InspectResult};

/// Validates that a collection is not empty.
#[inline]
pub fn validate_non_empty<T>(items: &[T], param_name: &str) -> InspectResult<()> {
    if items.is_empty() {
        return Err(InspectError::invalid_argument(format!(
            "Parameter '{}' cannot be empty",
            param_name
        )));
    }
    Ok(())
}

/// Validates that every element of a tensor is finite.
pub fn validate_finite_tensor<S, D>(tensor: &ArrayBase<S, D>, tensor_name: &str) -> InspectResult<()>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    if let Some(bad) = tensor.iter().find(|v| !v.is_finite()) {
        return Err(InspectError::invalid_argument(format!(
            "Tensor '{}' contains a non-finite value: {}",
            tensor_name, bad
        )));
    }
    Ok(())
}

/// Validates that a tensor has no zero-length axis.
pub fn validate_non_degenerate_shape(shape: &[usize], tensor_name: &str) -> InspectResult<()> {
    if shape.contains(&0) {
        return Err(InspectError::invalid_argument(format!(
            "Tensor '{}' has an empty axis: {:?}",
            tensor_name, shape
        )));
    }
    Ok(())
}

/// Validates that `actual` equals `expected` on the listed axes.
pub fn validate_axes_match(
    component: &str,
    tensor_name: &str,
    actual: &[usize],
    expected: &[usize],
    axes: &[usize],
) -> InspectResult<()> {
    let mismatch = axes
        .iter()
        .any(|&axis| actual.get(axis) != expected.get(axis));
    if mismatch {
        return Err(InspectError::shape_mismatch(
            component,
            tensor_name,
            &format!("{:?} on axes {:?}", expected, axes),
            actual,
        ));
    }
    Ok(())
}
