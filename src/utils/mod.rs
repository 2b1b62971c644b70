//! Utility functions shared by the pipelines.
//!
//! Image loading and binary-mask helpers.

pub mod image;

pub use self::image::{count_mask_pixels, is_binary_mask, load_image, mask_coverage};
