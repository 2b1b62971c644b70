//! Candidate defect regions and the annotation records built from them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use imageproc::contours::Contour;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{InspectError, InspectResult, ProcessingStage};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A closed polygon given by its ordered vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// The vertices, in tracing order.
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Builds a polygon from a traced contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Calculates the enclosed area using the shoelace formula.
    ///
    /// Returns 0.0 for polygons with fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area.abs() / 2.0
    }
}

/// A candidate defect region traced from a refined mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegion {
    /// Outline of the region.
    pub polygon: Polygon,
    /// Polygon area in px², cached at construction.
    pub area: f32,
    /// Class label carried into the annotation.
    pub label: String,
}

impl CandidateRegion {
    /// Creates a region, computing its area from the polygon.
    pub fn new(polygon: Polygon, label: impl Into<String>) -> Self {
        let area = polygon.area();
        Self {
            polygon,
            area,
            label: label.into(),
        }
    }
}

/// A weak-label annotation handed to the dataset-conversion step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Class label.
    pub label: String,
    /// Polygon vertices as `[x, y]` pairs.
    pub polygon: Vec<[f32; 2]>,
    /// Polygon area in px².
    pub area: f32,
    /// Source image, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl AnnotationRecord {
    /// Converts a surviving candidate into an annotation record.
    pub fn from_region(region: &CandidateRegion, source: Option<&Path>) -> Self {
        Self {
            label: region.label.clone(),
            polygon: region.polygon.points.iter().map(|p| [p.x, p.y]).collect(),
            area: region.area,
            source: source.map(|p| p.display().to_string()),
        }
    }
}

/// Writes annotation records to `path` as a pretty-printed JSON array.
///
/// # Errors
///
/// `Processing` tagged [`ProcessingStage::AnnotationExport`] when the file
/// cannot be created or written.
pub fn write_annotations(path: &Path, records: &[AnnotationRecord]) -> InspectResult<()> {
    let export_error = |e: std::io::Error| {
        InspectError::processing(
            ProcessingStage::AnnotationExport,
            format!("writing {}", path.display()),
            e,
        )
    };
    let file = File::create(path).map_err(export_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records).map_err(|e| export_error(e.into()))?;
    writer.flush().map_err(export_error)?;
    debug!(path = %path.display(), count = records.len(), "annotations written");
    Ok(())
}
