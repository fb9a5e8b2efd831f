//! Image loading helpers.

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};

/// Load an image from disk into memory.
///
/// # Arguments
///
/// * `path` - The path to the image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Load the mask asset as RGBA, preserving its alpha channel.
///
/// # Arguments
///
/// * `path` - The path to the mask image.
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
    let path_ref = path.as_ref();
    let mask = image::open(path_ref)
        .with_context(|| format!("failed to open mask asset {}", path_ref.display()))?
        .to_rgba8();
    anyhow::ensure!(
        mask.width() > 0 && mask.height() > 0,
        "mask asset {} has zero dimensions",
        path_ref.display()
    );
    Ok(mask)
}
