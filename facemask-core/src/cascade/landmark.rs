//! Facial landmark regressors.
//!
//! Landmark models share the pupil cascade format; what differs is how the
//! search window is derived. Instead of a face-box offset, a landmark window
//! is anchored on the refined pupil pair, so its placement tracks the
//! in-plane rotation of the face. Each model file localizes one named
//! landmark, and a directory of them loads into a [`LandmarkSet`].

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use log::debug;

use super::puploc::PupilFinder;
use crate::grayscale::GrayBuffer;
use crate::locate::{LandmarkLocator, Point, SearchWindow};

/// Window placement relative to the pupil midpoint, as fractions of the
/// inter-pupil distance.
const WINDOW_ROW_RATIO: f32 = 0.25;
const WINDOW_COL_RATIO: f32 = 0.15;
const WINDOW_SCALE_RATIO: f32 = 3.0;

/// A single landmark regressor plus its voting budget.
#[derive(Debug, Clone)]
pub struct LandmarkFinder {
    cascade: PupilFinder,
    perturbs: u32,
}

impl LandmarkFinder {
    pub fn new(cascade: PupilFinder, perturbs: u32) -> Self {
        Self { cascade, perturbs }
    }

    /// Read and unpack a landmark model file.
    pub fn from_file<P: AsRef<Path>>(path: P, perturbs: u32) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .with_context(|| format!("failed to read landmark cascade {}", path.display()))?;
        let cascade = PupilFinder::unpack(&data)
            .with_context(|| format!("failed to unpack landmark cascade {}", path.display()))?;
        Ok(Self::new(cascade, perturbs))
    }

    /// Window anchored on the pupil pair.
    ///
    /// Degenerate pupils produce a degenerate window, which the voter turns
    /// into a "not found" point further down.
    fn window(&self, left_eye: Point, right_eye: Point) -> SearchWindow {
        let d_row = (right_eye.row - left_eye.row) as f32;
        let d_col = (right_eye.col - left_eye.col) as f32;
        let dist = d_row.hypot(d_col);

        let row = (left_eye.row + right_eye.row) as f32 / 2.0 + WINDOW_ROW_RATIO * dist;
        let col = (left_eye.col + right_eye.col) as f32 / 2.0 + WINDOW_COL_RATIO * dist;

        SearchWindow {
            row: row as i32,
            col: col as i32,
            scale: WINDOW_SCALE_RATIO * dist,
            perturbs: self.perturbs,
        }
    }
}

impl LandmarkLocator for LandmarkFinder {
    fn locate(
        &self,
        image: &GrayBuffer,
        left_eye: Point,
        right_eye: Point,
        mirrored: bool,
    ) -> Point {
        if left_eye.is_degenerate() || right_eye.is_degenerate() {
            return Point::not_found();
        }
        self.cascade.vote(image, self.window(left_eye, right_eye), mirrored)
    }
}

/// Landmark models loaded from a directory, keyed by file stem.
#[derive(Debug, Default)]
pub struct LandmarkSet {
    finders: HashMap<String, LandmarkFinder>,
}

impl LandmarkSet {
    /// Load every regular file in `dir` as a landmark model.
    pub fn load_dir<P: AsRef<Path>>(dir: P, perturbs: u32) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to read landmark directory {}", dir.display()))?;

        let mut finders = HashMap::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to list landmark directory {}", dir.display()))?
                .path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let finder = LandmarkFinder::from_file(&path, perturbs)?;
            finders.insert(stem.to_owned(), finder);
        }

        anyhow::ensure!(
            !finders.is_empty(),
            "no landmark cascades found in {}",
            dir.display()
        );
        debug!("loaded {} landmark cascades from {}", finders.len(), dir.display());
        Ok(Self { finders })
    }

    /// Look up a model by its file stem.
    pub fn get(&self, name: &str) -> Option<&LandmarkFinder> {
        self.finders.get(name)
    }

    /// Look up a model, failing with the available names listed.
    pub fn require(&self, name: &str) -> Result<&LandmarkFinder> {
        self.get(name).with_context(|| {
            let mut names: Vec<_> = self.finders.keys().map(String::as_str).collect();
            names.sort_unstable();
            format!(
                "landmark cascade {name:?} not loaded (available: {})",
                names.join(", ")
            )
        })
    }

    pub fn len(&self) -> usize {
        self.finders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finders.is_empty()
    }
}
