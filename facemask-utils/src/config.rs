//! Shared configuration types consumed across the facemask workspace.
//!
//! These structures provide a common representation for scan, clustering, and
//! overlay settings that can be serialized to disk and overridden from the CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Detector scan parameters controlling the sliding-window sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanSettings {
    /// Smallest face window side length in pixels.
    pub min_size: u32,
    /// Largest face window side length in pixels.
    pub max_size: u32,
    /// Window shift per step, as a fraction of the current window size.
    pub shift_factor: f64,
    /// Multiplier applied to the window size between scan passes. Must stay
    /// above 1.05 or the sweep degenerates into an unbounded scan.
    pub scale_factor: f64,
    /// Pre-rotation of the scan window: 0.0 is 0 radians, 1.0 is 2*pi radians.
    pub angle: f64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            min_size: 20,
            max_size: 1000,
            shift_factor: 0.1,
            scale_factor: 1.1,
            angle: 0.0,
        }
    }
}

/// Parameters for merging overlapping raw detections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterSettings {
    /// Intersection-over-union threshold above which two detections are
    /// considered the same face.
    pub iou_threshold: f32,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self { iou_threshold: 0.2 }
    }
}

/// Parameters for the per-face overlay pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlaySettings {
    /// Minimum detection score for a face to receive an overlay. Detections
    /// at or below this value are kept in the list but never drawn.
    pub quality_threshold: f32,
    /// Number of perturbed runs per pupil/landmark localization.
    pub perturbs: u32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            quality_threshold: 5.0,
            perturbs: 63,
        }
    }
}

/// Locations of the cascade models and the mask asset.
///
/// These are fixed resources rather than CLI flags; the settings file is the
/// only way to relocate them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetSettings {
    /// Binary face classifier cascade.
    pub face_cascade: String,
    /// Binary pupil localization cascade.
    pub pupil_cascade: String,
    /// Directory of landmark localization cascades.
    pub landmark_dir: String,
    /// Mask image overlaid on each face. Expected to carry an alpha channel.
    pub mask_image: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            face_cascade: "cascades/facefinder".to_string(),
            pupil_cascade: "cascades/puploc".to_string(),
            landmark_dir: "cascades/lps".to_string(),
            mask_image: "assets/facemask.png".to_string(),
        }
    }
}

/// Top-level settings shared by the CLI and tests.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    /// Detector sweep parameters.
    pub scan: ScanSettings,
    /// Detection clustering parameters.
    pub cluster: ClusterSettings,
    /// Overlay quality filter and localization parameters.
    pub overlay: OverlaySettings,
    /// Model and mask asset locations.
    pub assets: AssetSettings,
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing fields fall back to their defaults; a missing or unparsable
    /// file is an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    ///
    /// This will overwrite the file if it already exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}
