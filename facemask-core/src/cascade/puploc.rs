//! Pupil localization cascade.
//!
//! A staged regression ensemble: each stage's trees vote on a (row, col)
//! correction, the window shrinks by the stored multiplier, and the next
//! stage refines from there. A single run is sensitive to the starting
//! window, so the locator runs a batch of perturbed starts and takes the
//! per-axis median ("perturbation voting"). Voting is seeded from the
//! search window, keeping repeated runs bit-identical.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::ByteReader;
use crate::grayscale::GrayBuffer;
use crate::locate::{Point, PupilLocator, SearchWindow};

/// Relative spread of the perturbed starting positions.
const POSITION_JITTER: f32 = 0.15;
/// Smallest and largest starting-scale multipliers.
const SCALE_JITTER_MIN: f32 = 0.925;
const SCALE_JITTER_SPAN: f32 = 0.15;

/// Pupil regressor unpacked from the binary cascade format.
#[derive(Debug, Clone)]
pub struct PupilFinder {
    stages: u32,
    scale_multiplier: f32,
    trees_per_stage: u32,
    tree_depth: u32,
    /// Per stage, per tree: 4 offset bytes per internal node.
    codes: Vec<i8>,
    /// Per stage, per tree: (row, col) correction per leaf.
    preds: Vec<f32>,
}

impl PupilFinder {
    /// Read and unpack a cascade file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .with_context(|| format!("failed to read pupil cascade {}", path.display()))?;
        Self::unpack(&data)
            .with_context(|| format!("failed to unpack pupil cascade {}", path.display()))
    }

    /// Unpack a cascade blob.
    ///
    /// Layout: stage count (i32), scale multiplier (f32), trees per stage
    /// (i32), tree depth (i32), then per stage and tree the node codes and
    /// the two-channel leaf predictions.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let stages = reader.read_i32()?;
        let scale_multiplier = reader.read_f32()?;
        let trees_per_stage = reader.read_i32()?;
        let tree_depth = reader.read_i32()?;

        anyhow::ensure!(stages > 0, "cascade has no stages");
        anyhow::ensure!(trees_per_stage > 0, "cascade has no trees");
        anyhow::ensure!(
            (1..=16).contains(&tree_depth),
            "invalid tree depth {tree_depth}"
        );
        anyhow::ensure!(
            scale_multiplier.is_finite() && scale_multiplier > 0.0,
            "invalid scale multiplier {scale_multiplier}"
        );

        let leaves = 1usize << tree_depth;
        let blocks = stages as usize * trees_per_stage as usize;
        let mut codes = Vec::with_capacity(blocks * 4 * (leaves - 1));
        let mut preds = Vec::with_capacity(blocks * 2 * leaves);

        for _ in 0..blocks {
            codes.extend(reader.read_i8_slice(4 * (leaves - 1))?);
            preds.extend(reader.read_f32_slice(2 * leaves)?);
        }

        debug!(
            "pupil cascade: {} stages x {} trees, depth {}, shrink {:.3}",
            stages, trees_per_stage, tree_depth, scale_multiplier
        );

        Ok(Self {
            stages: stages as u32,
            scale_multiplier,
            trees_per_stage: trees_per_stage as u32,
            tree_depth: tree_depth as u32,
            codes,
            preds,
        })
    }

    /// One regression run from a single starting window.
    ///
    /// `mirrored` flips the horizontal offsets of every comparison so the
    /// same model localizes the horizontally mirrored variant of its point.
    pub(crate) fn refine(
        &self,
        mut row: f32,
        mut col: f32,
        mut scale: f32,
        image: &GrayBuffer,
        mirrored: bool,
    ) -> (f32, f32, f32) {
        let leaves = 1usize << self.tree_depth;
        let code_stride = 4 * (leaves - 1);
        let pred_stride = 2 * leaves;
        let col_sign = if mirrored { -1.0f32 } else { 1.0f32 };

        for stage in 0..self.stages as usize {
            let mut dr = 0.0f32;
            let mut dc = 0.0f32;

            for tree in 0..self.trees_per_stage as usize {
                let block = stage * self.trees_per_stage as usize + tree;
                let codes = &self.codes[block * code_stride..(block + 1) * code_stride];

                let mut idx = 1usize;
                for _ in 0..self.tree_depth {
                    let base = 4 * (idx - 1);
                    let r1 = row + f32::from(codes[base]) * scale / 256.0;
                    let c1 = col + col_sign * f32::from(codes[base + 1]) * scale / 256.0;
                    let r2 = row + f32::from(codes[base + 2]) * scale / 256.0;
                    let c2 = col + col_sign * f32::from(codes[base + 3]) * scale / 256.0;

                    let bintest =
                        image.at(r1 as i32, c1 as i32) <= image.at(r2 as i32, c2 as i32);
                    idx = 2 * idx + usize::from(bintest);
                }

                let leaf = idx - leaves;
                dr += self.preds[block * pred_stride + 2 * leaf];
                dc += col_sign * self.preds[block * pred_stride + 2 * leaf + 1];
            }

            row += dr * scale;
            col += dc * scale;
            scale *= self.scale_multiplier;
        }
        (row, col, scale)
    }

    /// Perturbation voting around a search window.
    pub(crate) fn vote(
        &self,
        image: &GrayBuffer,
        window: SearchWindow,
        mirrored: bool,
    ) -> Point {
        if window.perturbs == 0 || window.scale <= 0.0 {
            return Point::not_found();
        }

        let mut rng = StdRng::seed_from_u64(window_seed(&window));
        let n = window.perturbs as usize;
        let mut rows = Vec::with_capacity(n);
        let mut cols = Vec::with_capacity(n);
        let mut scales = Vec::with_capacity(n);

        for _ in 0..n {
            let scale = window.scale * (SCALE_JITTER_MIN + SCALE_JITTER_SPAN * rng.gen::<f32>());
            let row = window.row as f32 + window.scale * POSITION_JITTER * (rng.gen::<f32>() - 0.5);
            let col = window.col as f32 + window.scale * POSITION_JITTER * (rng.gen::<f32>() - 0.5);

            let (r, c, s) = self.refine(row, col, scale, image, mirrored);
            rows.push(r);
            cols.push(c);
            scales.push(s);
        }

        let row = median(&mut rows);
        let col = median(&mut cols);
        let scale = median(&mut scales);

        if !row.is_finite()
            || !col.is_finite()
            || row < 0.0
            || col < 0.0
            || row >= image.rows as f32
            || col >= image.cols as f32
        {
            return Point::not_found();
        }

        Point {
            row: row as i32,
            col: col as i32,
            scale,
        }
    }
}

impl PupilLocator for PupilFinder {
    fn locate(&self, image: &GrayBuffer, window: SearchWindow) -> Point {
        self.vote(image, window, false)
    }
}

/// Deterministic seed derived from the window geometry, so identical runs
/// vote over identical perturbations.
fn window_seed(window: &SearchWindow) -> u64 {
    let mut seed = 0x5DEECE66Du64;
    for part in [
        window.row as u32 as u64,
        window.col as u32 as u64,
        u64::from(window.scale.to_bits()),
        u64::from(window.perturbs),
    ] {
        seed = seed.wrapping_mul(0x100000001B3).wrapping_add(part);
    }
    seed
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values[values.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One stage, one depth-1 tree with zero offsets and a fixed correction.
    fn tiny_cascade(dr: f32, dc: f32, shrink: f32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1i32.to_le_bytes()); // stages
        data.extend_from_slice(&shrink.to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes()); // trees per stage
        data.extend_from_slice(&1i32.to_le_bytes()); // depth
        data.extend_from_slice(&[0u8, 0, 0, 0]); // root codes
        // Leaf 0 predictions.
        data.extend_from_slice(&0.0f32.to_le_bytes());
        data.extend_from_slice(&0.0f32.to_le_bytes());
        // Leaf 1 predictions (taken: self-comparison bintest is true).
        data.extend_from_slice(&dr.to_le_bytes());
        data.extend_from_slice(&dc.to_le_bytes());
        data
    }

    fn flat_image() -> GrayBuffer {
        GrayBuffer::new(vec![100; 200 * 200], 200, 200).unwrap()
    }

    fn window(row: i32, col: i32, scale: f32) -> SearchWindow {
        SearchWindow {
            row,
            col,
            scale,
            perturbs: 63,
        }
    }

    #[test]
    fn unpack_round_trips_header_fields() {
        let finder = PupilFinder::unpack(&tiny_cascade(0.1, -0.2, 0.8)).expect("unpack");
        assert_eq!(finder.stages, 1);
        assert_eq!(finder.trees_per_stage, 1);
        assert_eq!(finder.tree_depth, 1);
        assert!((finder.scale_multiplier - 0.8).abs() < f32::EPSILON);
        assert_eq!(finder.codes.len(), 4);
        assert_eq!(finder.preds.len(), 4);
    }

    #[test]
    fn unpack_rejects_truncated_data() {
        let data = tiny_cascade(0.1, -0.2, 0.8);
        assert!(PupilFinder::unpack(&data[..data.len() - 3]).is_err());
        assert!(PupilFinder::unpack(&data[..6]).is_err());
    }

    #[test]
    fn refine_applies_scaled_corrections() {
        let finder = PupilFinder::unpack(&tiny_cascade(0.25, -0.5, 0.5)).expect("unpack");
        let (r, c, s) = finder.refine(100.0, 100.0, 40.0, &flat_image(), false);
        assert!((r - 110.0).abs() < 1e-4); // 100 + 0.25 * 40
        assert!((c - 80.0).abs() < 1e-4); // 100 - 0.5 * 40
        assert!((s - 20.0).abs() < 1e-4);
    }

    #[test]
    fn mirrored_refinement_negates_the_column_correction() {
        let finder = PupilFinder::unpack(&tiny_cascade(0.25, -0.5, 0.5)).expect("unpack");
        let (_, c, _) = finder.refine(100.0, 100.0, 40.0, &flat_image(), true);
        assert!((c - 120.0).abs() < 1e-4); // 100 + 0.5 * 40
    }

    #[test]
    fn voting_is_deterministic_per_window() {
        let finder = PupilFinder::unpack(&tiny_cascade(0.1, 0.1, 0.9)).expect("unpack");
        let image = flat_image();
        let a = finder.vote(&image, window(100, 100, 30.0), false);
        let b = finder.vote(&image, window(100, 100, 30.0), false);
        assert_eq!(a, b);

        // A different window perturbs differently.
        let c = finder.vote(&image, window(101, 100, 30.0), false);
        assert_ne!(a, c);
    }

    #[test]
    fn out_of_image_result_degenerates_to_not_found() {
        // A huge correction pushes the point far outside the buffer.
        let finder = PupilFinder::unpack(&tiny_cascade(50.0, 50.0, 1.0)).expect("unpack");
        let point = finder.vote(&flat_image(), window(100, 100, 30.0), false);
        assert_eq!(point, Point::not_found());
    }

    #[test]
    fn empty_window_is_not_found() {
        let finder = PupilFinder::unpack(&tiny_cascade(0.1, 0.1, 0.9)).expect("unpack");
        let degenerate = SearchWindow {
            row: 10,
            col: 10,
            scale: 0.0,
            perturbs: 63,
        };
        assert_eq!(finder.vote(&flat_image(), degenerate, false), Point::not_found());
    }
}
