//! Core facemask primitives.
//!
//! This crate turns raw face-detector output into correctly scaled, rotated,
//! and positioned mask overlays. Detection, pupil localization, and landmark
//! localization are consumed through capability traits so the geometry core
//! stays testable with synthetic detectors; `cascade` supplies the concrete
//! decision-tree backends.

/// Overlay transform computation (rotation angle, scale, placement origin).
pub mod alignment;
/// Decision-tree cascade backends for the detection traits.
pub mod cascade;
/// Mask resampling, rotation, and alpha compositing.
pub mod compositor;
/// Detection data model, IoU, and clustering.
pub mod detection;
/// Grayscale pixel buffers consumed by the classifiers.
pub mod grayscale;
/// Capability traits and pupil/landmark orchestration.
pub mod locate;
/// The per-face overlay loop tying the pieces together.
pub mod pipeline;

pub use alignment::{AlignmentCalculator, AlignmentTransform};
pub use cascade::{FaceFinder, LandmarkFinder, LandmarkSet, PupilFinder};
pub use compositor::overlay_mask;
pub use detection::{Detection, ScanParams, cluster_detections};
pub use grayscale::GrayBuffer;
pub use locate::{
    FaceDetector, FaceFeatures, LandmarkLocator, Point, PupilLocator, SearchWindow, eye_windows,
    locate_features,
};
pub use pipeline::{OverlayPipeline, RenderMode};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
