//! ROI cropping and misalignment detection.
//!
//! Vehicles are photographed from a fixed camera position, so the body panel
//! should fill the crop window with little structure. An edge density above
//! the configured ratio means the body has drifted and the station needs
//! recalibration; the crop is still returned and the caller decides.

use std::path::Path;

use image::RgbImage;
use imageproc::edges::canny;
use tracing::{debug, warn};

use crate::core::config::EdgeAlarmConfig;
use crate::core::InspectResult;
use crate::domain::Roi;
use crate::utils::load_image;

/// Result of cropping one image to its ROI.
#[derive(Debug, Clone)]
pub struct RoiCheck {
    /// The cropped sub-image, exactly `roi.width × roi.height`.
    pub crop: RgbImage,
    /// Fraction of crop pixels marked as edges.
    pub edge_ratio: f32,
    /// True when `edge_ratio` exceeds the configured alarm ratio.
    pub alarm: bool,
}

/// Crops images to a fixed ROI and raises a misalignment alarm.
#[derive(Debug, Clone)]
pub struct RoiValidator {
    roi: Roi,
    edge: EdgeAlarmConfig,
}

impl RoiValidator {
    pub fn new(roi: Roi, edge: EdgeAlarmConfig) -> Self {
        Self { roi, edge }
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    /// Crops `image` and evaluates the edge-density alarm.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the ROI is empty or does not fit inside the image.
    /// A high edge density is reported through [`RoiCheck::alarm`], never as an error.
    pub fn crop_and_validate(&self, image: &RgbImage) -> InspectResult<RoiCheck> {
        let (width, height) = image.dimensions();
        self.roi.check_within(width, height)?;

        let crop = image::imageops::crop_imm(
            image,
            self.roi.x,
            self.roi.y,
            self.roi.width,
            self.roi.height,
        )
        .to_image();

        let edge_ratio = self.edge_ratio(&crop);
        let alarm = edge_ratio > self.edge.alarm_ratio;
        debug!(
            edge_ratio,
            threshold = self.edge.alarm_ratio,
            "ROI edge density measured"
        );
        if alarm {
            warn!(
                edge_ratio,
                threshold = self.edge.alarm_ratio,
                "ROI edge density above threshold; vehicle may be misaligned"
            );
        }

        Ok(RoiCheck {
            crop,
            edge_ratio,
            alarm,
        })
    }

    /// Loads the image at `path`, then crops and validates it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the file cannot be opened or decoded.
    pub fn crop_and_validate_path(&self, path: &Path) -> InspectResult<RoiCheck> {
        let image = load_image(path)?;
        self.crop_and_validate(&image)
    }

    /// Fraction of pixels the hysteresis edge detector marks in `crop`.
    pub fn edge_ratio(&self, crop: &RgbImage) -> f32 {
        let total = crop.width() as usize * crop.height() as usize;
        if total == 0 {
            return 0.0;
        }
        let gray = image::imageops::grayscale(crop);
        let edges = canny(&gray, self.edge.low_threshold, self.edge.high_threshold);
        let count = edges.pixels().filter(|p| p[0] > 0).count();
        count as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InspectError;
    use image::Rgb;

    fn validator(roi: Roi) -> RoiValidator {
        RoiValidator::new(roi, EdgeAlarmConfig::default())
    }

    /// 64×64 black image with `stripes` white vertical bands 4 px wide.
    fn striped(stripes: u32) -> RgbImage {
        RgbImage::from_fn(64, 64, |x, _| {
            let on = (0..stripes).any(|i| {
                let start = 8 + 12 * i;
                x >= start && x < start + 4
            });
            if on { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        })
    }

    #[test]
    fn test_crop_matches_roi_dimensions() {
        let image = RgbImage::from_pixel(200, 150, Rgb([30, 30, 30]));
        for roi in [Roi::new(10, 20, 50, 40), Roi::new(0, 0, 199, 149), Roi::new(100, 100, 1, 1)] {
            let check = validator(roi).crop_and_validate(&image).unwrap();
            assert_eq!(check.crop.dimensions(), (roi.width, roi.height));
        }
    }

    #[test]
    fn test_crop_takes_the_right_window() {
        let image = RgbImage::from_fn(20, 20, |x, y| Rgb([x as u8, y as u8, 0]));
        let check = validator(Roi::new(5, 7, 4, 4)).crop_and_validate(&image).unwrap();
        assert_eq!(*check.crop.get_pixel(0, 0), Rgb([5, 7, 0]));
        assert_eq!(*check.crop.get_pixel(3, 3), Rgb([8, 10, 0]));
    }

    #[test]
    fn test_uniform_panel_raises_no_alarm() {
        let image = RgbImage::from_pixel(64, 64, Rgb([20, 20, 20]));
        let check = validator(Roi::new(0, 0, 64, 64)).crop_and_validate(&image).unwrap();
        assert_eq!(check.edge_ratio, 0.0);
        assert!(!check.alarm);
    }

    #[test]
    fn test_structured_crop_raises_alarm() {
        let check = validator(Roi::new(0, 0, 64, 64))
            .crop_and_validate(&striped(3))
            .unwrap();
        assert!(check.edge_ratio > 0.01);
        assert!(check.alarm);
    }

    #[test]
    fn test_edge_ratio_monotonic_in_edge_density() {
        let v = validator(Roi::new(0, 0, 64, 64));
        let ratios: Vec<f32> = (0..=4).map(|n| v.edge_ratio(&striped(n))).collect();
        for pair in ratios.windows(2) {
            assert!(pair[1] >= pair[0], "ratios not monotonic: {:?}", ratios);
        }
        assert!(ratios[4] > ratios[0]);
    }

    #[test]
    fn test_roi_outside_image_is_invalid() {
        let image = RgbImage::new(50, 50);
        let err = validator(Roi::new(40, 40, 20, 20))
            .crop_and_validate(&image)
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = validator(Roi::new(0, 0, 10, 10))
            .crop_and_validate_path(Path::new("/nonexistent/panel.png"))
            .unwrap_err();
        assert!(matches!(err, InspectError::NotFound { .. }));
    }
}
