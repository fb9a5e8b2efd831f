//! Binary face classifier cascade.
//!
//! The model is an ensemble of fixed-depth decision trees over pixel
//! intensity comparisons. Each tree contributes a vote; a running total that
//! drops below the tree's threshold rejects the window early. Offsets inside
//! a window are stored as signed bytes and scaled by the window size in
//! 8-bit fixed point.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::debug;

use super::ByteReader;
use crate::detection::{Detection, ScanParams};
use crate::grayscale::GrayBuffer;
use crate::locate::FaceDetector;

/// Face classifier unpacked from the compact binary cascade format.
#[derive(Debug, Clone)]
pub struct FaceFinder {
    tree_depth: u32,
    tree_num: u32,
    /// Per tree: 4 padding bytes, then 4 offset bytes per internal node.
    tree_codes: Vec<i8>,
    /// Per tree: one prediction per leaf.
    tree_preds: Vec<f32>,
    /// Per tree: early-reject threshold.
    thresholds: Vec<f32>,
}

impl FaceFinder {
    /// Read and unpack a cascade file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .with_context(|| format!("failed to read face cascade {}", path.display()))?;
        Self::unpack(&data)
            .with_context(|| format!("failed to unpack face cascade {}", path.display()))
    }

    /// Unpack a cascade blob.
    ///
    /// Layout: 8 reserved bytes, tree depth (i32), tree count (i32), then per
    /// tree the node codes, leaf predictions, and the stage threshold.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        reader.skip(8)?;

        let tree_depth = reader.read_i32()?;
        let tree_num = reader.read_i32()?;
        anyhow::ensure!(
            (1..=16).contains(&tree_depth),
            "invalid tree depth {tree_depth}"
        );
        anyhow::ensure!(tree_num > 0, "cascade has no trees");

        let leaves = 1usize << tree_depth;
        let mut tree_codes = Vec::with_capacity(tree_num as usize * 4 * leaves);
        let mut tree_preds = Vec::with_capacity(tree_num as usize * leaves);
        let mut thresholds = Vec::with_capacity(tree_num as usize);

        for _ in 0..tree_num {
            // Node 0 is unused; padding keeps the 4 * idx addressing direct.
            tree_codes.extend_from_slice(&[0, 0, 0, 0]);
            tree_codes.extend(reader.read_i8_slice(4 * (leaves - 1))?);
            tree_preds.extend(reader.read_f32_slice(leaves)?);
            thresholds.push(reader.read_f32()?);
        }

        debug!(
            "face cascade: {} trees of depth {}, {} trailing bytes",
            tree_num,
            tree_depth,
            reader.remaining()
        );

        Ok(Self {
            tree_depth: tree_depth as u32,
            tree_num: tree_num as u32,
            tree_codes,
            tree_preds,
            thresholds,
        })
    }

    /// Classify an upright square window centered at (row, col).
    ///
    /// Returns the accumulated confidence when the window passes every
    /// stage, and a negative value otherwise.
    pub fn classify_region(&self, row: i32, col: i32, scale: i32, image: &GrayBuffer) -> f32 {
        // 8-bit fixed point: offsets are signed bytes covering +-scale/2.
        let r = row * 256;
        let c = col * 256;

        let leaves = 1usize << self.tree_depth;
        let mut out = 0.0f32;
        let mut root = 0usize;

        for t in 0..self.tree_num as usize {
            let mut idx = 1usize;
            for _ in 0..self.tree_depth {
                let base = root + 4 * idx;
                let r1 = (r + i32::from(self.tree_codes[base]) * scale) >> 8;
                let c1 = (c + i32::from(self.tree_codes[base + 1]) * scale) >> 8;
                let r2 = (r + i32::from(self.tree_codes[base + 2]) * scale) >> 8;
                let c2 = (c + i32::from(self.tree_codes[base + 3]) * scale) >> 8;
                let bintest = image.at(r1, c1) <= image.at(r2, c2);
                idx = 2 * idx + usize::from(bintest);
            }
            out += self.tree_preds[leaves * t + idx - leaves];

            if out <= self.thresholds[t] {
                return -1.0;
            }
            root += 4 * leaves;
        }
        out - self.thresholds[self.tree_num as usize - 1]
    }

    /// Classify a window whose sampling grid is pre-rotated by `angle`
    /// (0.0 .. 1.0 mapping to 0 .. 2*pi).
    pub fn classify_rotated_region(
        &self,
        row: i32,
        col: i32,
        scale: i32,
        angle: f64,
        image: &GrayBuffer,
    ) -> f32 {
        let theta = angle * 2.0 * std::f64::consts::PI;
        // 16-bit fixed point keeps the rotation integral and deterministic.
        let qsin = (65536.0 * theta.sin()) as i64;
        let qcos = (65536.0 * theta.cos()) as i64;

        let r = i64::from(row) * 65536;
        let c = i64::from(col) * 65536;
        let s = i64::from(scale);

        let leaves = 1usize << self.tree_depth;
        let mut out = 0.0f32;
        let mut root = 0usize;

        for t in 0..self.tree_num as usize {
            let mut idx = 1usize;
            for _ in 0..self.tree_depth {
                let base = root + 4 * idx;
                let dr1 = i64::from(self.tree_codes[base]) * s;
                let dc1 = i64::from(self.tree_codes[base + 1]) * s;
                let dr2 = i64::from(self.tree_codes[base + 2]) * s;
                let dc2 = i64::from(self.tree_codes[base + 3]) * s;

                // Offsets carry an extra 8-bit scale factor, hence the
                // pre-shift before dropping back to pixel units.
                let r1 = ((r + ((qcos * dr1 - qsin * dc1) >> 8)) >> 16) as i32;
                let c1 = ((c + ((qsin * dr1 + qcos * dc1) >> 8)) >> 16) as i32;
                let r2 = ((r + ((qcos * dr2 - qsin * dc2) >> 8)) >> 16) as i32;
                let c2 = ((c + ((qsin * dr2 + qcos * dc2) >> 8)) >> 16) as i32;

                let bintest = image.at(r1, c1) <= image.at(r2, c2);
                idx = 2 * idx + usize::from(bintest);
            }
            out += self.tree_preds[leaves * t + idx - leaves];

            if out <= self.thresholds[t] {
                return -1.0;
            }
            root += 4 * leaves;
        }
        out - self.thresholds[self.tree_num as usize - 1]
    }
}

impl FaceDetector for FaceFinder {
    /// Sweep the buffer with a window growing from `min_size` to `max_size`.
    fn detect(&self, image: &GrayBuffer, params: &ScanParams) -> Vec<Detection> {
        let mut detections = Vec::new();
        let max_size = params.max_size.min(image.rows.min(image.cols) as u32);

        let mut scale = params.min_size as f64;
        while scale <= f64::from(max_size) {
            let step = (params.shift_factor * scale).max(1.0) as i32;
            let size = scale as i32;
            let offset = size / 2 + 1;

            let mut row = offset;
            while row <= image.rows as i32 - offset {
                let mut col = offset;
                while col <= image.cols as i32 - offset {
                    let score = if params.angle > 0.0 {
                        self.classify_rotated_region(row, col, size, params.angle, image)
                    } else {
                        self.classify_region(row, col, size, image)
                    };
                    if score > 0.0 {
                        detections.push(Detection {
                            row,
                            col,
                            scale: size,
                            score,
                        });
                    }
                    col += step;
                }
                row += step;
            }
            scale *= params.scale_factor;
        }
        detections
    }
}
