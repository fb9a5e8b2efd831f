//! Full pipeline runs against synthetic cascade models: load models and
//! assets from disk, scan, cluster, overlay, and encode, the same path the
//! binary takes.

use std::fs;
use std::path::Path;

use image::{Rgba, RgbaImage};

use facemask_core::{
    FaceDetector, FaceFinder, GrayBuffer, LandmarkSet, OverlayPipeline, PupilFinder, RenderMode,
    ScanParams, cluster_detections,
};
use facemask_utils::{config::AppSettings, image_utils::load_mask, output::save_canvas};

/// Face cascade with a single always-accepting tree scoring 6.0.
fn face_cascade_bytes() -> Vec<u8> {
    let mut data = vec![0u8; 8];
    data.extend_from_slice(&1i32.to_le_bytes()); // depth
    data.extend_from_slice(&1i32.to_le_bytes()); // trees
    data.extend_from_slice(&[0u8, 0, 0, 0]); // root codes
    data.extend_from_slice(&(-1.0f32).to_le_bytes());
    data.extend_from_slice(&7.0f32.to_le_bytes());
    data.extend_from_slice(&1.0f32.to_le_bytes()); // threshold
    data
}

/// Pupil-format cascade with one tree applying a small fixed correction.
fn pupil_cascade_bytes() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1i32.to_le_bytes()); // stages
    data.extend_from_slice(&0.8f32.to_le_bytes()); // shrink
    data.extend_from_slice(&1i32.to_le_bytes()); // trees per stage
    data.extend_from_slice(&1i32.to_le_bytes()); // depth
    data.extend_from_slice(&[0u8, 0, 0, 0]); // root codes
    for value in [0.0f32, 0.0, 0.05, 0.05] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Lay out cascades, a mask, and an input photo under `root`.
fn write_assets(root: &Path) -> AppSettings {
    let cascades = root.join("cascades");
    let lps = cascades.join("lps");
    fs::create_dir_all(&lps).unwrap();
    fs::write(cascades.join("facefinder"), face_cascade_bytes()).unwrap();
    fs::write(cascades.join("puploc"), pupil_cascade_bytes()).unwrap();
    fs::write(lps.join("lp84"), pupil_cascade_bytes()).unwrap();

    let assets = root.join("assets");
    fs::create_dir_all(&assets).unwrap();
    let mask = RgbaImage::from_pixel(100, 100, Rgba([255, 0, 255, 255]));
    mask.save(assets.join("facemask.png")).unwrap();

    let mut settings = AppSettings::default();
    settings.assets.face_cascade = cascades.join("facefinder").display().to_string();
    settings.assets.pupil_cascade = cascades.join("puploc").display().to_string();
    settings.assets.landmark_dir = lps.display().to_string();
    settings.assets.mask_image = assets.join("facemask.png").display().to_string();
    settings.scan.min_size = 40;
    settings.scan.max_size = 60;
    settings.scan.shift_factor = 0.25;
    settings.scan.scale_factor = 1.2;
    settings
}

fn input_photo() -> RgbaImage {
    RgbaImage::from_fn(60, 60, |x, y| {
        let v = ((x * 3 + y * 2) % 256) as u8;
        Rgba([v, v / 2, 255 - v, 255])
    })
}

fn run_once(settings: &AppSettings, output: &Path) -> RgbaImage {
    let faces_model = FaceFinder::from_file(&settings.assets.face_cascade).unwrap();
    let pupils = PupilFinder::from_file(&settings.assets.pupil_cascade).unwrap();
    let landmarks =
        LandmarkSet::load_dir(&settings.assets.landmark_dir, settings.overlay.perturbs).unwrap();
    let mouth = landmarks.require("lp84").unwrap();
    let mask = load_mask(&settings.assets.mask_image).unwrap();

    let mut canvas = input_photo();
    let gray = GrayBuffer::from_rgba(&canvas);

    let raw = faces_model.detect(&gray, &ScanParams::from(&settings.scan));
    let faces = cluster_detections(raw, settings.cluster.iou_threshold);
    assert!(!faces.is_empty(), "synthetic cascade must accept windows");

    let mut pipeline = OverlayPipeline::new(&pupils, mouth, settings.overlay);
    let overlaid = pipeline.run(&mut canvas, &gray, &mask, &faces, RenderMode::Mask);
    assert!(overlaid > 0, "score 6.0 clears the 5.0 quality threshold");

    save_canvas(&canvas, output).unwrap();
    canvas
}

#[test]
fn pipeline_preserves_canvas_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_assets(dir.path());
    let output = dir.path().join("out.png");

    let canvas = run_once(&settings, &output);
    assert_eq!(canvas.dimensions(), (60, 60));

    let saved = image::open(&output).unwrap();
    assert_eq!(saved.width(), 60);
    assert_eq!(saved.height(), 60);
}

#[test]
fn masked_output_differs_from_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_assets(dir.path());

    let canvas = run_once(&settings, &dir.path().join("out.png"));
    assert_ne!(canvas, input_photo());
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_assets(dir.path());

    let first = dir.path().join("first.png");
    let second = dir.path().join("second.png");
    run_once(&settings, &first);
    run_once(&settings, &second);

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn jpeg_destination_is_encoded() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_assets(dir.path());
    let output = dir.path().join("out.jpg");

    run_once(&settings, &output);
    let saved = image::open(&output).unwrap();
    assert_eq!(saved.width(), 60);
}
