//! Helpers for encoding the composited canvas.
//!
//! Centralizes output-format selection and encoder tuning so the CLI and the
//! integration tests share a single implementation.

use anyhow::{Context, Result};
use image::{
    ExtendedColorType, ImageEncoder, RgbaImage,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
    },
};
use log::debug;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// JPEG output matches the source material as closely as the codec allows.
const JPEG_QUALITY: u8 = 100;

/// Canonical image formats supported for the composited output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormatHint {
    Png,
    Jpeg,
}

impl ImageFormatHint {
    /// Determine format from a filesystem extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Resolve the output format from a destination path.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .with_context(|| {
                format!(
                    "output file type not supported: {} (expected jpg, jpeg, or png)",
                    path.display()
                )
            })
    }
}

/// Encode the canvas and write it to `destination`.
///
/// The format is chosen from the destination extension; JPEG output flattens
/// the alpha channel, PNG preserves it.
pub fn save_canvas(canvas: &RgbaImage, destination: &Path) -> Result<()> {
    let format = ImageFormatHint::from_path(destination)?;
    debug!(
        "Saving {}x{} canvas to {} as {:?}",
        canvas.width(),
        canvas.height(),
        destination.display(),
        format
    );

    let encoded = match format {
        ImageFormatHint::Png => encode_png(canvas)?,
        ImageFormatHint::Jpeg => encode_jpeg(canvas)?,
    };
    write_bytes(destination, &encoded)
}

fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            CompressionType::Default,
            FilterType::Adaptive,
        );
        encoder
            .write_image(
                canvas.as_raw(),
                canvas.width(),
                canvas.height(),
                ExtendedColorType::Rgba8,
            )
            .context("failed to encode PNG")?;
    }
    Ok(buffer)
}

fn encode_jpeg(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let rgb = image::DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut buffer = Vec::new();
    {
        let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
        encoder
            .write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )
            .context("failed to encode JPEG")?;
    }
    Ok(buffer)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}
