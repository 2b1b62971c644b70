//! Contour extraction and area filtering for weak-label generation.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use tracing::debug;

use crate::core::InspectResult;
use crate::core::errors::InspectError;
use crate::domain::{CandidateRegion, Polygon};

/// Traces the outer border of every connected component in `mask`.
///
/// Holes are not reported as separate regions; a ring-shaped defect yields
/// one candidate whose polygon follows its outer border.
pub fn extract_candidates(mask: &GrayImage, label: &str) -> Vec<CandidateRegion> {
    let candidates: Vec<CandidateRegion> = find_contours::<u32>(mask)
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| CandidateRegion::new(Polygon::from_contour(contour), label))
        .collect();
    debug!(count = candidates.len(), "contours extracted");
    candidates
}

/// Keeps candidate regions whose polygon area reaches a minimum.
#[derive(Debug, Clone, Copy)]
pub struct WeakLabelFilter {
    min_area: f32,
}

impl WeakLabelFilter {
    /// Creates a filter.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `min_area` is negative or not finite.
    pub fn new(min_area: f32) -> InspectResult<Self> {
        if !min_area.is_finite() || min_area < 0.0 {
            return Err(InspectError::invalid_argument(format!(
                "min_area must be a finite non-negative number, got {min_area}"
            )));
        }
        Ok(Self { min_area })
    }

    pub fn min_area(&self) -> f32 {
        self.min_area
    }

    /// Returns the candidates with `area >= min_area`, in input order.
    pub fn filter(&self, candidates: Vec<CandidateRegion>) -> Vec<CandidateRegion> {
        let before = candidates.len();
        let kept: Vec<CandidateRegion> = candidates
            .into_iter()
            .filter(|c| c.area >= self.min_area)
            .collect();
        debug!(
            before,
            after = kept.len(),
            min_area = self.min_area,
            "weak-label filter applied"
        );
        kept
    }

    /// Like [`filter`](Self::filter), but an empty result is an error.
    ///
    /// # Errors
    ///
    /// `Degenerate` when no candidate reaches the minimum area.
    pub fn filter_required(&self, candidates: Vec<CandidateRegion>) -> InspectResult<Vec<CandidateRegion>> {
        let kept = self.filter(candidates);
        if kept.is_empty() {
            return Err(InspectError::degenerate(format!(
                "no candidate region reaches the minimum area of {}",
                self.min_area
            )));
        }
        Ok(kept)
    }
}
