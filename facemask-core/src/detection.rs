//! Detection data model, IoU computation, and overlap clustering.

use std::cmp::Ordering;

use facemask_utils::config::ScanSettings;

/// A single raw face candidate.
///
/// `row` and `col` name the center of a square face box; `scale` is the box
/// side length. Detections are immutable once clustered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Vertical center of the face box.
    pub row: i32,
    /// Horizontal center of the face box.
    pub col: i32,
    /// Side length of the square face box.
    pub scale: i32,
    /// Classifier confidence. Used as an accept/reject filter downstream,
    /// and to pick the surviving representative while clustering.
    pub score: f32,
}

impl Detection {
    /// Intersection over union with another square detection box.
    pub fn iou(&self, other: &Self) -> f32 {
        let half_a = self.scale as f32 / 2.0;
        let half_b = other.scale as f32 / 2.0;

        let x1 = (self.col as f32 - half_a).max(other.col as f32 - half_b);
        let y1 = (self.row as f32 - half_a).max(other.row as f32 - half_b);
        let x2 = (self.col as f32 + half_a).min(other.col as f32 + half_b);
        let y2 = (self.row as f32 + half_a).min(other.row as f32 + half_b);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }

        let area_a = (self.scale as f32) * (self.scale as f32);
        let area_b = (other.scale as f32) * (other.scale as f32);
        let union = area_a + area_b - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Parameters controlling the detector's sliding-window sweep.
#[derive(Debug, Clone, Copy)]
pub struct ScanParams {
    /// Smallest window side length in pixels.
    pub min_size: u32,
    /// Largest window side length in pixels.
    pub max_size: u32,
    /// Window shift per step, as a fraction of the current window size.
    pub shift_factor: f64,
    /// Multiplier applied to the window size between passes.
    pub scale_factor: f64,
    /// Scan-window pre-rotation: 0.0 is 0 radians, 1.0 is 2*pi radians.
    pub angle: f64,
}

impl Default for ScanParams {
    fn default() -> Self {
        ScanSettings::default().into()
    }
}

impl From<ScanSettings> for ScanParams {
    fn from(settings: ScanSettings) -> Self {
        ScanParams {
            min_size: settings.min_size,
            max_size: settings.max_size,
            shift_factor: settings.shift_factor,
            scale_factor: settings.scale_factor,
            angle: settings.angle,
        }
    }
}

impl From<&ScanSettings> for ScanParams {
    fn from(settings: &ScanSettings) -> Self {
        (*settings).into()
    }
}

/// Merge overlapping raw candidates into a de-duplicated face list.
///
/// Candidates are sorted by score and kept greedily: a candidate whose IoU
/// with any already-kept detection exceeds `threshold` collapses into that
/// cluster, leaving the higher-scoring representative. Guarantees that the
/// output is no larger than the input and that no two surviving detections
/// overlap above the threshold.
pub fn cluster_detections(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut result: Vec<Detection> = Vec::with_capacity(detections.len());
    for detection in detections.drain(..) {
        let mut suppressed = false;
        for kept in &result {
            if detection.iou(kept) > threshold {
                suppressed = true;
                break;
            }
        }
        if !suppressed {
            result.push(detection);
        }
    }
    result
}
