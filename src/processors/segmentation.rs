//! Paint-specific color-space segmentation.
//!
//! Each paint hides defects in a different channel: value for black,
//! saturation for white, hue for red. The segmenter normalizes illumination
//! on the Lab lightness channel, converts to HSV and keeps pixels that fall
//! in any of the paint's configured HSV ranges.

use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use super::clahe::Clahe;
use super::color::{normalize_illumination, rgb_to_hsv};
use crate::core::config::{ConfigValidator, SegmentationConfig};
use crate::core::{InspectResult, MASK_ON};
use crate::domain::{HsvRange, PaintType};
use crate::utils::mask_coverage;

/// Produces binary candidate-defect masks per paint type.
#[derive(Debug, Clone)]
pub struct ColorSegmenter {
    config: SegmentationConfig,
    clahe: Clahe,
}

impl ColorSegmenter {
    /// Creates a segmenter after validating its configuration.
    pub fn new(config: SegmentationConfig) -> InspectResult<Self> {
        config.validate()?;
        let clahe = Clahe::new(config.clip_limit, config.tile_grid);
        Ok(Self { config, clahe })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segments a cropped image for one paint type.
    ///
    /// The mask has the same dimensions as `image`; candidate pixels are
    /// 255, everything else 0.
    pub fn segment(&self, image: &RgbImage, paint: PaintType) -> GrayImage {
        let normalized = normalize_illumination(image, &self.clahe);
        let mask = threshold_hsv(&normalized, self.config.ranges_for(paint));
        debug!(
            paint = %paint,
            coverage = mask_coverage(&mask),
            "color segmentation complete"
        );
        mask
    }

    /// Segments using a textual paint tag.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for any tag other than black, white or red.
    pub fn segment_tag(&self, image: &RgbImage, tag: &str) -> InspectResult<GrayImage> {
        let paint: PaintType = tag.parse()?;
        Ok(self.segment(image, paint))
    }

    /// Segments one image for every paint type, sharing the normalization pass.
    pub fn segment_all(&self, image: &RgbImage) -> Vec<(PaintType, GrayImage)> {
        let normalized = normalize_illumination(image, &self.clahe);
        PaintType::ALL
            .iter()
            .map(|&paint| (paint, threshold_hsv(&normalized, self.config.ranges_for(paint))))
            .collect()
    }
}

/// Marks pixels whose HSV value falls in any of `ranges`.
fn threshold_hsv(image: &RgbImage, ranges: &[HsvRange]) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let hsv = rgb_to_hsv(*pixel);
        if ranges.iter().any(|range| range.contains(hsv)) {
            mask.put_pixel(x, y, Luma([MASK_ON]));
        }
    }
    mask
}
