//! Mask resampling, rotation, and alpha compositing onto the shared canvas.

use image::{Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::alignment::AlignmentTransform;

/// Draw the mask onto `canvas` according to `transform`.
///
/// The mask is resampled to the transform's target size with a Lanczos
/// filter (cheaper filters alias visibly on straight mask edges), rotated
/// about its center into an expanded bounding box with transparent corners,
/// and alpha-composited at the transform's origin. Degenerate transforms
/// draw nothing. Canvas pixels outside the mask's opaque area are left
/// untouched, and the canvas never changes size.
pub fn overlay_mask(canvas: &mut RgbaImage, mask: &RgbaImage, transform: &AlignmentTransform) {
    if transform.is_degenerate() {
        return;
    }

    let width = transform.width as u32;
    let height = transform.height as u32;
    let resized = imageops::resize(mask, width, height, imageops::FilterType::Lanczos3);

    let rotated = rotate_expanded(&resized, transform.angle);

    imageops::overlay(
        canvas,
        &rotated,
        i64::from(transform.origin_x),
        i64::from(transform.origin_y),
    );
}

/// Rotate `image` counter-clockwise by `angle` degrees about its center,
/// expanding the output raster to hold the rotated extent and filling the
/// exposed corners with full transparency.
fn rotate_expanded(image: &RgbaImage, angle: f64) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (out_w, out_h) = rotated_extent(w, h, angle);

    // Screen coordinates grow downward, so a negative theta produces the
    // counter-clockwise rotation the lean convention expects.
    let theta = (-angle.to_radians()) as f32;
    let projection = Projection::translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
        * Projection::rotate(theta)
        * Projection::translate(-(w as f32) / 2.0, -(h as f32) / 2.0);

    let mut out = RgbaImage::new(out_w, out_h);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
        &mut out,
    );
    out
}

/// Bounding box of a w x h rectangle rotated by `angle` degrees.
fn rotated_extent(w: u32, h: u32, angle: f64) -> (u32, u32) {
    let theta = angle.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let out_w = (f64::from(w) * cos + f64::from(h) * sin).ceil() as u32;
    let out_h = (f64::from(w) * sin + f64::from(h) * cos).ceil() as u32;
    (out_w.max(1), out_h.max(1))
}
