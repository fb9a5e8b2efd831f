//! Overlay transform computation.
//!
//! Turns a face box plus its landmark pair into the rotation, size, and
//! placement origin used by the compositor.

use crate::detection::Detection;
use crate::locate::Point;

/// The transform consumed exactly once by the compositor for one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentTransform {
    /// Normalized lean value fed to the rotation step. 0.0 means no
    /// rotation; the unit is not plain degrees (see `AlignmentCalculator`).
    pub angle: f64,
    /// Target overlay width in pixels (fractional; truncated on resample).
    pub width: f64,
    /// Target overlay height in pixels.
    pub height: f64,
    /// Horizontal placement of the overlay's top-left corner on the canvas.
    pub origin_x: i32,
    /// Vertical placement of the overlay's top-left corner on the canvas.
    pub origin_y: i32,
}

impl AlignmentTransform {
    /// A transform too small to draw anything.
    pub fn is_degenerate(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }
}

/// Factor shrinking the overlay below the full face-box footprint so it
/// matches typical mask coverage.
const COVERAGE_SHRINK: f64 = 0.75;

/// Computes overlay transforms, one face at a time.
///
/// The calculator is stateful: `img_scale` persists across faces and is only
/// refreshed when the mask does not fit inside the current face box. A face
/// whose box already contains the mask reuses the previous value (0.0 if no
/// earlier face set one), collapsing the overlay to zero size. The carryover
/// is intentional; see DESIGN.md before "fixing" it.
#[derive(Debug, Default)]
pub struct AlignmentCalculator {
    img_scale: f64,
}

impl AlignmentCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scale factor carried over from the last computed transform.
    pub fn current_scale(&self) -> f64 {
        self.img_scale
    }

    /// Compute the overlay transform for one face.
    ///
    /// `p1` and `p2` are the unmirrored/mirrored landmark points; `mask_w`
    /// and `mask_h` are the mask asset's natural dimensions. Never fails:
    /// degenerate inputs yield a (possibly degenerate) transform.
    pub fn transform(
        &mut self,
        face: &Detection,
        p1: Point,
        p2: Point,
        mask_w: u32,
        mask_h: u32,
    ) -> AlignmentTransform {
        // Lean between the two landmark points, mapped into the normalized
        // unit the rotation step expects. The exact expression is load-bearing
        // for visual parity and must not be rearranged.
        let angle = 1.0
            - (f64::from(p2.col - p1.col).atan2(f64::from(p2.row - p1.row)) * 180.0
                / std::f64::consts::PI
                / 90.0);

        let dx = mask_w as i32;
        let dy = mask_h as i32;
        if face.scale < dx || face.scale < dy {
            self.img_scale = f64::from(face.scale) / f64::from(dx.max(dy));
        }

        let width = f64::from(dx) * self.img_scale * COVERAGE_SHRINK;
        let height = f64::from(dy) * self.img_scale * COVERAGE_SHRINK;

        let origin_x = face.col - (width / 2.0) as i32;
        let origin_y = p1.row + (p1.row - p2.row) / 2 - (height / 2.0) as i32;

        AlignmentTransform {
            angle,
            width,
            height,
            origin_x,
            origin_y,
        }
    }
}
