//! Grayscale pixel buffers consumed by the cascade classifiers.

use image::RgbaImage;

/// Row-major 8-bit grayscale buffer with explicit dimensions.
///
/// The classifiers address pixels as `row * cols + col`, so the buffer keeps
/// the row stride equal to the image width.
#[derive(Debug, Clone)]
pub struct GrayBuffer {
    /// Row-major intensity values, `rows * cols` bytes.
    pub pixels: Vec<u8>,
    /// Image height in pixels.
    pub rows: usize,
    /// Image width in pixels.
    pub cols: usize,
}

impl GrayBuffer {
    /// Build a buffer from raw grayscale bytes.
    ///
    /// Returns `None` when the byte count does not match the dimensions.
    pub fn new(pixels: Vec<u8>, rows: usize, cols: usize) -> Option<Self> {
        if pixels.len() != rows * cols {
            return None;
        }
        Some(Self { pixels, rows, cols })
    }

    /// Convert an RGBA canvas using the classifier-native luminance weights
    /// (ITU-R BT.601), matching the intensities the cascades were trained on.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let (cols, rows) = (image.width() as usize, image.height() as usize);
        let mut pixels = Vec::with_capacity(rows * cols);
        for px in image.pixels() {
            let gray =
                0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
            pixels.push(gray.round().clamp(0.0, 255.0) as u8);
        }
        Self { pixels, rows, cols }
    }

    /// Intensity at (row, col), clamped to the image bounds.
    #[inline]
    pub fn at(&self, row: i32, col: i32) -> u8 {
        let r = row.clamp(0, self.rows as i32 - 1) as usize;
        let c = col.clamp(0, self.cols as i32 - 1) as usize;
        self.pixels[r * self.cols + c]
    }
}
