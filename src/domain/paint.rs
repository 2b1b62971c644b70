//! Paint types and their HSV threshold ranges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::InspectError;

/// The closed set of paint lines the segmenter knows how to threshold.
///
/// Parsing rejects any other tag, so an unknown paint never reaches
/// the segmentation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintType {
    /// Dark paint; defects show up in the value channel.
    Black,
    /// Light paint; defects show up in the saturation channel.
    White,
    /// Red paint; defects show up in the hue channel, which wraps at 0°/180°.
    Red,
}

impl PaintType {
    /// All supported paint types.
    pub const ALL: [PaintType; 3] = [PaintType::Black, PaintType::White, PaintType::Red];

    /// Lowercase tag used in configuration files and annotation output.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaintType::Black => "black",
            PaintType::White => "white",
            PaintType::Red => "red",
        }
    }

    /// Default HSV ranges (OpenCV 8-bit convention) for this paint.
    ///
    /// A pixel is a candidate when it falls in any of the returned ranges.
    pub fn default_ranges(&self) -> Vec<HsvRange> {
        match self {
            PaintType::Black => vec![HsvRange::new([0, 0, 0], [180, 255, 50])],
            PaintType::White => vec![HsvRange::new([0, 0, 200], [180, 30, 255])],
            PaintType::Red => vec![
                HsvRange::new([0, 120, 70], [10, 255, 255]),
                HsvRange::new([170, 120, 70], [180, 255, 255]),
            ],
        }
    }
}

impl fmt::Display for PaintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaintType {
    type Err = InspectError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "black" => Ok(PaintType::Black),
            "white" => Ok(PaintType::White),
            "red" => Ok(PaintType::Red),
            other => Err(InspectError::invalid_argument(format!(
                "unknown paint type '{}', expected one of black, white, red",
                other
            ))),
        }
    }
}

/// An inclusive HSV box in OpenCV 8-bit units (H in 0..=180, S and V in 0..=255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    /// Lower bound `[h, s, v]`.
    pub lower: [u8; 3],
    /// Upper bound `[h, s, v]`.
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Returns true when `hsv` lies inside the box on all three channels.
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }

    /// Returns true when every lower bound is at most its upper bound.
    pub fn is_well_formed(&self) -> bool {
        (0..3).all(|c| self.lower[c] <= self.upper[c]) && self.upper[0] <= 180
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paint_types() {
        assert_eq!("black".parse::<PaintType>().unwrap(), PaintType::Black);
        assert_eq!(" White ".parse::<PaintType>().unwrap(), PaintType::White);
        assert_eq!("RED".parse::<PaintType>().unwrap(), PaintType::Red);
    }

    #[test]
    fn test_unknown_paint_rejected() {
        let err = "blue".parse::<PaintType>().unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));
    }

    #[test]
    fn test_serde_rejects_unknown_variant() {
        assert!(serde_json::from_str::<PaintType>("\"silver\"").is_err());
        let red: PaintType = serde_json::from_str("\"red\"").unwrap();
        assert_eq!(red, PaintType::Red);
    }

    #[test]
    fn test_red_range_wraps_hue() {
        let ranges = PaintType::Red.default_ranges();
        assert_eq!(ranges.len(), 2);
        assert!(ranges.iter().any(|r| r.contains([2, 200, 200])));
        assert!(ranges.iter().any(|r| r.contains([178, 200, 200])));
        assert!(!ranges.iter().any(|r| r.contains([90, 200, 200])));
    }

    #[test]
    fn test_default_ranges_well_formed() {
        for paint in PaintType::ALL {
            assert!(paint.default_ranges().iter().all(HsvRange::is_well_formed));
        }
    }
}
