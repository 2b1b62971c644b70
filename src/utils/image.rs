//! Utility functions for image loading and binary masks.
//!
//! Masks throughout the crate are `GrayImage`s holding only 0 and 255, the
//! representation `imageproc`'s morphology and contour routines expect.

use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::core::{InspectError, InspectResult, MASK_ON};

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Errors
///
/// Returns `InspectError::NotFound` carrying the offending path if the file
/// cannot be opened or decoded.
pub fn load_image(path: &Path) -> InspectResult<RgbImage> {
    let img = image::open(path).map_err(|e| InspectError::not_found(path, e))?;
    Ok(img.to_rgb8())
}

/// Number of foreground pixels in `mask`.
pub fn count_mask_pixels(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

/// Fraction of `mask` covered by foreground pixels.
pub fn mask_coverage(mask: &GrayImage) -> f32 {
    let total = mask.width() as usize * mask.height() as usize;
    if total == 0 {
        return 0.0;
    }
    count_mask_pixels(mask) as f32 / total as f32
}

/// Returns true when every pixel is either 0 or [`MASK_ON`].
pub fn is_binary_mask(mask: &GrayImage) -> bool {
    mask.pixels().all(|p| p[0] == 0 || p[0] == MASK_ON)
}
