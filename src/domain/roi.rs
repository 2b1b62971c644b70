//! Region-of-interest rectangle.

use serde::{Deserialize, Serialize};

use crate::core::{InspectError, InspectResult};

/// Fixed crop window for one camera station, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width of the window.
    pub width: u32,
    /// Height of the window.
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of pixels covered by the window.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Checks that the window is non-empty and lies inside an image of the
    /// given dimensions.
    pub fn check_within(&self, image_width: u32, image_height: u32) -> InspectResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(InspectError::invalid_argument(format!(
                "ROI dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        if right > u64::from(image_width) || bottom > u64::from(image_height) {
            return Err(InspectError::invalid_argument(format!(
                "ROI ({}, {}, {}, {}) exceeds image bounds {}x{}",
                self.x, self.y, self.width, self.height, image_width, image_height
            )));
        }
        Ok(())
    }
}
