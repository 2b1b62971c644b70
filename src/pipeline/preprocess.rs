//! The classical preprocessing pipeline.
//!
//! raw image → ROI crop and alarm → color segmentation → morphological
//! refinement → contour extraction → weak-label filter. The output carries
//! every intermediate artifact so callers can inspect or persist them.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::config::{ConfigValidator, InspectionConfig, ParallelPolicy, PreprocessConfig};
use crate::core::{InspectError, InspectResult, ProcessingStage};
use crate::domain::{AnnotationRecord, CandidateRegion, PaintType};
use crate::processors::{
    ColorSegmenter, MorphologicalRefiner, RoiValidator, WeakLabelFilter, extract_candidates,
};
use crate::utils::load_image;

/// Artifacts of one preprocessing run.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    /// The ROI crop.
    pub crop: RgbImage,
    /// Edge-pixel ratio of the crop.
    pub edge_ratio: f32,
    /// Misalignment alarm.
    pub alarm: bool,
    /// Segmenter output.
    pub raw_mask: GrayImage,
    /// Mask after opening, closing and smoothing.
    pub refined_mask: GrayImage,
    /// Every region traced from the refined mask.
    pub candidates: Vec<CandidateRegion>,
    /// Regions that passed the weak-label filter.
    pub regions: Vec<CandidateRegion>,
}

impl PreprocessOutput {
    /// Converts the surviving regions into annotation records.
    pub fn annotations(&self, source: Option<&Path>) -> Vec<AnnotationRecord> {
        self.regions
            .iter()
            .map(|region| AnnotationRecord::from_region(region, source))
            .collect()
    }
}

/// Result for one image of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: InspectResult<PreprocessOutput>,
}

/// Runs the preprocessing stages with one immutable configuration.
#[derive(Debug, Clone)]
pub struct PreprocessPipeline {
    validator: RoiValidator,
    segmenter: ColorSegmenter,
    refiner: MorphologicalRefiner,
    filter: WeakLabelFilter,
    paint: PaintType,
    label: String,
    require_candidates: bool,
    parallel: ParallelPolicy,
}

impl PreprocessPipeline {
    /// Builds the pipeline, validating the whole configuration up front.
    pub fn new(config: PreprocessConfig) -> InspectResult<Self> {
        config.validate()?;
        Ok(Self {
            validator: RoiValidator::new(config.roi, config.edge),
            segmenter: ColorSegmenter::new(config.segmentation)?,
            refiner: MorphologicalRefiner::new(config.morphology)?,
            filter: WeakLabelFilter::new(config.min_area)?,
            paint: config.paint_type,
            label: config.annotation_label,
            require_candidates: config.require_candidates,
            parallel: ParallelPolicy::default(),
        })
    }

    /// Builds the pipeline from a station configuration, keeping its
    /// parallel policy. The fusion section is validated but not used.
    pub fn from_inspection_config(config: &InspectionConfig) -> InspectResult<Self> {
        config.validate()?;
        Ok(Self::new(config.preprocess.clone())?.with_parallel_policy(config.parallel.clone()))
    }

    pub fn with_parallel_policy(mut self, policy: ParallelPolicy) -> Self {
        self.parallel = policy;
        self
    }

    pub fn parallel_policy(&self) -> &ParallelPolicy {
        &self.parallel
    }

    pub fn paint_type(&self) -> PaintType {
        self.paint
    }

    /// Processes one in-memory image.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the ROI does not fit the image; `Degenerate`
    /// when candidates are required and none survive the filter.
    pub fn run(&self, image: &RgbImage) -> InspectResult<PreprocessOutput> {
        let check = self.validator.crop_and_validate(image)?;
        let raw_mask = self.segmenter.segment(&check.crop, self.paint);
        let refined_mask = self.refiner.refine(&raw_mask);
        let candidates = extract_candidates(&refined_mask, &self.label);
        let regions = if self.require_candidates {
            self.filter.filter_required(candidates.clone())?
        } else {
            self.filter.filter(candidates.clone())
        };

        info!(
            paint = %self.paint,
            alarm = check.alarm,
            candidates = candidates.len(),
            kept = regions.len(),
            "preprocessing complete"
        );

        Ok(PreprocessOutput {
            crop: check.crop,
            edge_ratio: check.edge_ratio,
            alarm: check.alarm,
            raw_mask,
            refined_mask,
            candidates,
            regions,
        })
    }

    /// Loads and processes the image at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the file cannot be loaded, plus everything [`run`](Self::run) returns.
    pub fn run_path(&self, path: &Path) -> InspectResult<PreprocessOutput> {
        let image = load_image(path)?;
        self.run(&image)
    }

    /// Processes every path independently.
    ///
    /// A failing image is logged and reported in its [`BatchItem`]; the rest
    /// of the batch continues. Results keep the input order.
    ///
    /// # Errors
    ///
    /// Only when a dedicated thread pool for `max_threads` cannot be built.
    pub fn run_batch(&self, paths: &[PathBuf]) -> InspectResult<Vec<BatchItem>> {
        let process = |path: &PathBuf| {
            debug!(path = %path.display(), "processing image");
            let result = self.run_path(path);
            if let Err(err) = &result {
                warn!(
                    path = %path.display(),
                    error = %err,
                    per_image = err.is_per_image(),
                    "image skipped"
                );
            }
            BatchItem {
                path: path.clone(),
                result,
            }
        };

        if !self.parallel.should_parallelize(paths.len()) {
            debug!(count = paths.len(), "sequential batch");
            return Ok(paths.iter().map(process).collect());
        }

        debug!(count = paths.len(), "parallel batch");
        let items: Vec<BatchItem> = match self.parallel.max_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        InspectError::processing(
                            ProcessingStage::ThreadPool,
                            format!("failed to build a {}-thread pool", threads),
                            e,
                        )
                    })?;
                pool.install(|| paths.par_iter().map(process).collect())
            }
            None => paths.par_iter().map(process).collect(),
        };

        let failed = items.iter().filter(|item| item.result.is_err()).count();
        info!(total = paths.len(), failed, "batch complete");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Roi;
    use image::Rgb;

    /// Light panel with a dark square defect of side `side` at (40, 40).
    fn panel(side: u32) -> RgbImage {
        RgbImage::from_fn(120, 120, |x, y| {
            if (40..40 + side).contains(&x) && (40..40 + side).contains(&y) {
                Rgb([20, 20, 20])
            } else {
                Rgb([235, 235, 235])
            }
        })
    }

    fn pipeline() -> PreprocessPipeline {
        PreprocessPipeline::new(PreprocessConfig::new(Roi::new(0, 0, 120, 120), PaintType::Black))
            .unwrap()
    }

    #[test]
    fn test_dark_defect_becomes_one_annotation() {
        let output = pipeline().run(&panel(20)).unwrap();
        assert_eq!(output.regions.len(), 1);
        assert!((output.regions[0].area - 361.0).abs() < 1e-3);
        let records = output.annotations(Some(Path::new("panel.png")));
        assert_eq!(records[0].label, "defect");
        assert_eq!(records[0].source.as_deref(), Some("panel.png"));
    }

    #[test]
    fn test_speck_is_filtered_out() {
        let output = pipeline().run(&panel(2)).unwrap();
        assert!(output.regions.is_empty());
    }

    #[test]
    fn test_required_candidates_make_empty_result_degenerate() {
        let config = PreprocessConfig::new(Roi::new(0, 0, 120, 120), PaintType::Black)
            .with_require_candidates(true);
        let err = PreprocessPipeline::new(config)
            .unwrap()
            .run(&panel(2))
            .unwrap_err();
        assert!(matches!(err, InspectError::Degenerate { .. }));
    }

    #[test]
    fn test_batch_continues_past_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        panel(20).save(&good).unwrap();
        let paths = vec![dir.path().join("missing.png"), good.clone()];

        for policy in [
            ParallelPolicy::new(),
            ParallelPolicy::new().with_image_threshold(0).with_max_threads(Some(2)),
        ] {
            let items = pipeline()
                .with_parallel_policy(policy)
                .run_batch(&paths)
                .unwrap();
            assert_eq!(items.len(), 2);
            assert!(matches!(items[0].result, Err(InspectError::NotFound { .. })));
            assert_eq!(items[1].path, good);
            assert_eq!(items[1].result.as_ref().unwrap().regions.len(), 1);
        }
    }

    #[test]
    fn test_station_config_keeps_parallel_policy() {
        let mut config = InspectionConfig::get_defaults();
        config.preprocess = PreprocessConfig::new(Roi::new(0, 0, 120, 120), PaintType::Black);
        config.parallel = ParallelPolicy::new().with_image_threshold(0).with_max_threads(Some(2));

        let pipeline = PreprocessPipeline::from_inspection_config(&config).unwrap();
        assert_eq!(pipeline.parallel_policy(), &config.parallel);
        assert_eq!(pipeline.run(&panel(20)).unwrap().regions.len(), 1);

        config.parallel = ParallelPolicy::new().with_max_threads(Some(0));
        assert!(PreprocessPipeline::from_inspection_config(&config).is_err());
    }

    #[test]
    fn test_roi_larger_than_image_is_invalid() {
        let config = PreprocessConfig::new(Roi::new(100, 100, 50, 50), PaintType::Black);
        let err = PreprocessPipeline::new(config)
            .unwrap()
            .run(&panel(20))
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidArgument { .. }));
    }
}
