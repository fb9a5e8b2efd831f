//! Facemask command-line entry point.
//!
//! Loads the cascade models and the mask asset, scans the input photo for
//! faces, and writes a copy with an aligned mask composited over every face
//! that clears the quality threshold.

mod args;
mod spinner;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use facemask_core::{
    FaceDetector, FaceFinder, GrayBuffer, LandmarkSet, OverlayPipeline, PupilFinder, RenderMode,
    ScanParams, cluster_detections,
};
use facemask_utils::{
    config::AppSettings,
    image_utils::{load_image, load_mask},
    init_logging, normalize_path,
    output::{ImageFormatHint, save_canvas},
};

use crate::args::MaskArgs;
use crate::spinner::Spinner;

const BANNER: &str = r#"
  __                                     _
 / _| __ _  ___ ___ _ __ ___   __ _ ___| | __
| |_ / _` |/ __/ _ \ '_ ` _ \ / _` / __| |/ /
|  _| (_| | (_|  __/ | | | | | (_| \__ \   <
|_|  \__,_|\___\___|_| |_| |_|\__,_|___/_|\_\
"#;

/// Landmark model used to anchor the mask below the pupils.
const MOUTH_LANDMARK: &str = "lp84";

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = MaskArgs::parse();
    run(&args)
}

fn run(args: &MaskArgs) -> Result<()> {
    // Fail on an unsupported destination before any heavy lifting.
    let format = ImageFormatHint::from_path(&args.output)?;
    anyhow::ensure!(
        args.scale_factor > 1.05,
        "scale factor must be greater than 1.05, got {}",
        args.scale_factor
    );

    if !args.quiet {
        eprintln!("{BANNER}");
    }

    let settings = resolve_settings(args)?;
    let input_path = normalize_path(&args.input)?;

    let faces_model = FaceFinder::from_file(&settings.assets.face_cascade)?;
    let pupils = PupilFinder::from_file(&settings.assets.pupil_cascade)?;
    let landmarks =
        LandmarkSet::load_dir(&settings.assets.landmark_dir, settings.overlay.perturbs)?;
    let mouth = landmarks.require(MOUTH_LANDMARK)?;
    let mask = load_mask(&settings.assets.mask_image)?;

    let mut canvas = load_image(&input_path)?.to_rgba8();
    let gray = GrayBuffer::from_rgba(&canvas);
    info!(
        "scanning {} ({}x{})",
        input_path.display(),
        canvas.width(),
        canvas.height()
    );

    let spinner = (!args.quiet).then(|| Spinner::start("detecting faces..."));
    let started = Instant::now();

    let scan_params = ScanParams::from(&settings.scan);
    let raw = faces_model.detect(&gray, &scan_params);
    debug!("{} raw detection(s)", raw.len());
    let faces = cluster_detections(raw, settings.cluster.iou_threshold);
    info!("{} face(s) after clustering", faces.len());

    let mode = if args.markers {
        RenderMode::MaskWithMarkers
    } else {
        RenderMode::Mask
    };
    let mut pipeline = OverlayPipeline::new(&pupils, mouth, settings.overlay);
    let overlaid = pipeline.run(&mut canvas, &gray, &mask, &faces, mode);
    info!("{overlaid} face(s) masked");

    if let Some(spinner) = spinner {
        spinner.stop();
    }

    save_canvas(&canvas, &args.output)
        .with_context(|| format!("failed to write {:?} output", format))?;
    println!("Done in: {:.2}s", started.elapsed().as_secs_f64());

    Ok(())
}

/// Settings file first, then CLI flags on top.
fn resolve_settings(args: &MaskArgs) -> Result<AppSettings> {
    let mut settings = match args.config.as_ref() {
        Some(path) => AppSettings::load_from_path(normalize_path(path)?)?,
        None => AppSettings::default(),
    };

    settings.scan.min_size = args.min_size;
    settings.scan.max_size = args.max_size;
    settings.scan.shift_factor = args.shift_factor;
    settings.scan.scale_factor = args.scale_factor;
    settings.scan.angle = args.angle;
    settings.cluster.iou_threshold = args.iou_threshold;

    Ok(settings)
}
