//! Capability traits for the external classifiers plus the per-face
//! pupil/landmark orchestration.
//!
//! The cascade models are consumed as pure request/response collaborators:
//! a grayscale buffer and scan parameters yield detections, a search window
//! yields a refined pupil point, and a pupil pair yields a landmark point.
//! Keeping them behind traits lets the geometry pipeline run against
//! synthetic locators in tests.

use crate::detection::{Detection, ScanParams};
use crate::grayscale::GrayBuffer;

/// Left-eye window offsets relative to the face box, as fractions of the
/// face scale. The right eye shares the row offset.
const EYE_ROW_RATIO: f32 = 0.075;
const LEFT_EYE_COL_RATIO: f32 = 0.175;
const RIGHT_EYE_COL_RATIO: f32 = 0.185;
const EYE_SCALE_RATIO: f32 = 0.25;

/// A coarse localization window derived from a face box.
///
/// Transient: constructed per face, per eye, and discarded after use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    /// Vertical window center.
    pub row: i32,
    /// Horizontal window center.
    pub col: i32,
    /// Window side length.
    pub scale: f32,
    /// Number of perturbed localization runs to vote over.
    pub perturbs: u32,
}

/// A refined point produced by the pupil or landmark locator.
///
/// A degenerate value (`row` or `col` at or below zero) signals "not found";
/// it is propagated rather than treated as an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Vertical position.
    pub row: i32,
    /// Horizontal position.
    pub col: i32,
    /// Scale of the localization that produced the point.
    pub scale: f32,
}

impl Point {
    /// The "not found" marker value.
    pub fn not_found() -> Self {
        Self {
            row: 0,
            col: 0,
            scale: 0.0,
        }
    }

    /// Whether this point carries no usable location.
    pub fn is_degenerate(&self) -> bool {
        self.row <= 0 || self.col <= 0
    }
}

/// Source of raw face candidates.
pub trait FaceDetector {
    /// Scan a grayscale buffer and return scored square-box candidates.
    fn detect(&self, image: &GrayBuffer, params: &ScanParams) -> Vec<Detection>;
}

/// Refines a coarse eye window into a pupil point.
///
/// Each call is independent and side-effect-free.
pub trait PupilLocator {
    /// Locate a pupil inside `window`, or return a degenerate point.
    fn locate(&self, image: &GrayBuffer, window: SearchWindow) -> Point;
}

/// Derives a secondary facial reference point from the pupil pair.
pub trait LandmarkLocator {
    /// Locate the landmark for the given pupils. `mirrored` selects the
    /// left/right variant of the point.
    fn locate(&self, image: &GrayBuffer, left_eye: Point, right_eye: Point, mirrored: bool)
        -> Point;
}

/// Everything the alignment calculator needs for one face.
#[derive(Debug, Clone, Copy)]
pub struct FaceFeatures {
    /// Refined left pupil.
    pub left_eye: Point,
    /// Refined right pupil.
    pub right_eye: Point,
    /// First landmark reference point (unmirrored variant).
    pub p1: Point,
    /// Second landmark reference point (mirrored variant).
    pub p2: Point,
}

impl FaceFeatures {
    /// All four located points, in localization order.
    pub fn points(&self) -> [Point; 4] {
        [self.left_eye, self.right_eye, self.p1, self.p2]
    }
}

/// Build the two eye-search windows for a face using the fixed offset ratios.
pub fn eye_windows(face: &Detection, perturbs: u32) -> (SearchWindow, SearchWindow) {
    let scale = face.scale as f32;
    let row = face.row - (EYE_ROW_RATIO * scale) as i32;

    let left = SearchWindow {
        row,
        col: face.col - (LEFT_EYE_COL_RATIO * scale) as i32,
        scale: EYE_SCALE_RATIO * scale,
        perturbs,
    };
    let right = SearchWindow {
        row,
        col: face.col + (RIGHT_EYE_COL_RATIO * scale) as i32,
        scale: EYE_SCALE_RATIO * scale,
        perturbs,
    };
    (left, right)
}

/// Run pupil and landmark localization for one qualifying face.
///
/// Degenerate pupil or landmark results are passed through unchanged; the
/// caller feeds them into the alignment math without short-circuiting, which
/// can yield a degenerate transform rather than an explicit error.
pub fn locate_features(
    image: &GrayBuffer,
    face: &Detection,
    pupils: &dyn PupilLocator,
    landmarks: &dyn LandmarkLocator,
    perturbs: u32,
) -> FaceFeatures {
    let (left_window, right_window) = eye_windows(face, perturbs);

    let left_eye = pupils.locate(image, left_window);
    let right_eye = pupils.locate(image, right_window);

    let p1 = landmarks.locate(image, left_eye, right_eye, false);
    let p2 = landmarks.locate(image, left_eye, right_eye, true);

    FaceFeatures {
        left_eye,
        right_eye,
        p1,
        p2,
    }
}
