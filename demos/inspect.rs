//! Paint Inspection Example
//!
//! Runs the preprocessing pipeline over a set of photographs and writes one
//! weak-label annotation file (and optionally the refined mask) per image.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example inspect -- [OPTIONS] <IMAGES>...
//! ```
//!
//! # Arguments
//!
//! * `-c, --config` - Station configuration JSON (overrides the ROI/paint flags)
//! * `--roi` - Crop window as `x,y,width,height`
//! * `-p, --paint` - Paint type: black, white or red
//! * `-o, --output-dir` - Directory for annotation files and masks
//! * `<IMAGES>...` - Paths to input images to process
//!
//! # Example
//!
//! ```bash
//! cargo run --example inspect -- --roi 120,80,640,480 -p red -o labels/ door1.jpg door2.jpg
//! ```

use clap::Parser;
use paint_inspect::core::config::{ConfigValidator, InspectionConfig};
use paint_inspect::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// Command-line arguments for the inspection example
#[derive(Parser)]
#[command(name = "inspect")]
#[command(about = "Paint Inspection Example - extracts weak-label defect regions from images")]
struct Args {
    /// Paths to input images to process
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Station configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Crop window as x,y,width,height
    #[arg(long, value_delimiter = ',', num_args = 4, default_values_t = [0u32, 0, 640, 480])]
    roi: Vec<u32>,

    /// Paint type: black, white or red
    #[arg(short, long, default_value = "black")]
    paint: String,

    /// Minimum region area in px² (default: 50)
    #[arg(long, default_value = "50.0")]
    min_area: f32,

    /// Directory to write annotation files and refined masks
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also save the refined mask of each image as PNG
    #[arg(long)]
    save_masks: bool,

    /// Maximum number of worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    paint_inspect::core::init_tracing();

    let args = Args::parse();

    info!("Paint Inspection Example");

    let mut config = match &args.config {
        Some(path) => {
            let config = InspectionConfig::from_json_file(path)?;
            info!("Loaded station configuration from {}", path.display());
            config
        }
        None => {
            let paint: PaintType = args.paint.parse()?;
            let roi = Roi::new(args.roi[0], args.roi[1], args.roi[2], args.roi[3]);
            InspectionConfig {
                preprocess: PreprocessConfig::new(roi, paint).with_min_area(args.min_area),
                ..InspectionConfig::get_defaults()
            }
        }
    };
    if args.threads.is_some() {
        config.parallel = config.parallel.with_max_threads(args.threads);
    }
    let preprocess = &config.preprocess;

    if args.verbose {
        info!("Preprocessing Configuration:");
        info!("  ROI: {:?}", preprocess.roi);
        info!("  Paint: {}", preprocess.paint_type);
        info!("  Min area: {}", preprocess.min_area);
        info!(
            "  Kernels: open {} / close {}",
            preprocess.morphology.open_kernel, preprocess.morphology.close_kernel
        );
    }

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let pipeline = PreprocessPipeline::from_inspection_config(&config)?;

    info!("Processing {} images...", args.images.len());
    let start = Instant::now();
    let items = pipeline.run_batch(&args.images)?;
    let duration = start.elapsed();

    let mut failed = 0usize;
    let mut alarms = 0usize;
    for item in &items {
        let output = match &item.result {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to process {}: {}", item.path.display(), e);
                failed += 1;
                continue;
            }
        };

        if output.alarm {
            alarms += 1;
            warn!(
                "{}: edge ratio {:.4} above alarm threshold, check vehicle position",
                item.path.display(),
                output.edge_ratio
            );
        }
        info!(
            "{}: {} candidate(s), {} kept",
            item.path.display(),
            output.candidates.len(),
            output.regions.len()
        );

        let Some(dir) = &args.output_dir else {
            continue;
        };
        let stem = item
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let records = output.annotations(Some(&item.path));
        let annotation_path = dir.join(format!("{}.json", stem));
        write_annotations(&annotation_path, &records)?;
        if args.verbose {
            info!("  Wrote {}", annotation_path.display());
        }

        if args.save_masks {
            let mask_path = dir.join(format!("{}_mask.png", stem));
            output.refined_mask.save(&mask_path)?;
            if args.verbose {
                info!("  Wrote {}", mask_path.display());
            }
        }
    }

    info!(
        "Processed {} images in {:.2?} ({} failed, {} alarms)",
        items.len(),
        duration,
        failed,
        alarms
    );

    if failed == items.len() {
        return Err("No image could be processed".into());
    }
    Ok(())
}
