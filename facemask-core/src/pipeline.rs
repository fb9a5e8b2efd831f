//! The per-face overlay loop.
//!
//! Faces are processed strictly in clustered-detection order, one at a time:
//! pupils, landmarks, alignment, composite. The canvas is a single owned
//! raster threaded through by exclusive reference, so no locking is needed.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use log::debug;

use facemask_utils::config::OverlaySettings;

use crate::alignment::AlignmentCalculator;
use crate::compositor::overlay_mask;
use crate::detection::Detection;
use crate::grayscale::GrayBuffer;
use crate::locate::{LandmarkLocator, PupilLocator, locate_features};

/// What the pipeline renders for each qualifying face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Composite the aligned mask only.
    Mask,
    /// Composite the mask and additionally draw the face box and the four
    /// located points for visual verification.
    MaskWithMarkers,
}

/// Drives pupil/landmark localization, alignment, and compositing for a
/// clustered face list.
pub struct OverlayPipeline<'a> {
    pupils: &'a dyn PupilLocator,
    landmarks: &'a dyn LandmarkLocator,
    settings: OverlaySettings,
    calculator: AlignmentCalculator,
}

impl<'a> OverlayPipeline<'a> {
    pub fn new(
        pupils: &'a dyn PupilLocator,
        landmarks: &'a dyn LandmarkLocator,
        settings: OverlaySettings,
    ) -> Self {
        Self {
            pupils,
            landmarks,
            settings,
            calculator: AlignmentCalculator::new(),
        }
    }

    /// Overlay every qualifying face onto `canvas`, in `faces` order.
    ///
    /// Faces scoring at or below the quality threshold are skipped silently
    /// but remain in the caller's list. Returns the number of faces that
    /// went through the overlay path.
    pub fn run(
        &mut self,
        canvas: &mut RgbaImage,
        gray: &GrayBuffer,
        mask: &RgbaImage,
        faces: &[Detection],
        mode: RenderMode,
    ) -> usize {
        let mut overlaid = 0;
        for face in faces {
            if face.score <= self.settings.quality_threshold {
                continue;
            }

            let features =
                locate_features(gray, face, self.pupils, self.landmarks, self.settings.perturbs);
            let transform = self.calculator.transform(
                face,
                features.p1,
                features.p2,
                mask.width(),
                mask.height(),
            );
            debug!(
                "face at ({}, {}) scale {} score {:.2} -> angle {:.4}, {}x{} at ({}, {})",
                face.row,
                face.col,
                face.scale,
                face.score,
                transform.angle,
                transform.width as i64,
                transform.height as i64,
                transform.origin_x,
                transform.origin_y
            );

            overlay_mask(canvas, mask, &transform);

            if mode == RenderMode::MaskWithMarkers {
                draw_markers(canvas, face, &features.points());
            }
            overlaid += 1;
        }
        overlaid
    }
}

/// Draw the face box and small filled circles at each located point.
fn draw_markers(canvas: &mut RgbaImage, face: &Detection, points: &[crate::locate::Point]) {
    let rect_color = Rgba([255, 0, 0, 255]);
    let point_color = Rgba([0, 255, 0, 255]);

    if face.scale > 0 {
        let rect = Rect::at(face.col - face.scale / 2, face.row - face.scale / 2)
            .of_size(face.scale as u32, face.scale as u32);
        draw_hollow_rect_mut(canvas, rect, rect_color);
    }

    for point in points {
        if point.is_degenerate() {
            continue;
        }
        draw_filled_circle_mut(canvas, (point.col, point.row), 2, point_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::{Point, SearchWindow};
    use std::cell::RefCell;

    struct ScriptedPupils {
        seen_rows: RefCell<Vec<i32>>,
    }

    impl ScriptedPupils {
        fn new() -> Self {
            Self {
                seen_rows: RefCell::new(Vec::new()),
            }
        }
    }

    impl PupilLocator for ScriptedPupils {
        fn locate(&self, _image: &GrayBuffer, window: SearchWindow) -> Point {
            self.seen_rows.borrow_mut().push(window.row);
            Point {
                row: window.row,
                col: window.col,
                scale: window.scale,
            }
        }
    }

    /// Produces the reference landmark pair regardless of the pupils.
    struct ReferenceLandmarks;

    impl LandmarkLocator for ReferenceLandmarks {
        fn locate(
            &self,
            _image: &GrayBuffer,
            _left: Point,
            _right: Point,
            mirrored: bool,
        ) -> Point {
            if mirrored {
                Point {
                    row: 128,
                    col: 110,
                    scale: 1.0,
                }
            } else {
                Point {
                    row: 130,
                    col: 90,
                    scale: 1.0,
                }
            }
        }
    }

    fn gray(size: usize) -> GrayBuffer {
        GrayBuffer::new(vec![0; size * size], size, size).unwrap()
    }

    fn mask(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba([255, 0, 255, 255]))
    }

    fn face(row: i32, col: i32, scale: i32, score: f32) -> Detection {
        Detection {
            row,
            col,
            scale,
            score,
        }
    }

    #[test]
    fn overlays_exactly_the_faces_above_threshold() {
        let pupils = ScriptedPupils::new();
        let mut pipeline =
            OverlayPipeline::new(&pupils, &ReferenceLandmarks, OverlaySettings::default());
        let mut canvas = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 0, 255]));

        let faces = [
            face(100, 100, 80, 10.0),
            face(200, 200, 80, 5.0), // boundary: not strictly above 5.0
            face(250, 120, 80, 4.2),
        ];

        let count = pipeline.run(
            &mut canvas,
            &gray(300),
            &mask(200),
            &faces,
            RenderMode::Mask,
        );
        assert_eq!(count, 1);
        // Two pupil calls per qualifying face.
        assert_eq!(pupils.seen_rows.borrow().len(), 2);
    }

    #[test]
    fn reference_scenario_paints_the_expected_region() {
        let pupils = ScriptedPupils::new();
        let mut pipeline =
            OverlayPipeline::new(&pupils, &ReferenceLandmarks, OverlaySettings::default());
        let mut canvas = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 0, 255]));

        let faces = [face(100, 100, 80, 10.0)];
        pipeline.run(
            &mut canvas,
            &gray(300),
            &mask(200),
            &faces,
            RenderMode::Mask,
        );

        assert_eq!(canvas.dimensions(), (300, 300));
        // Overlay is a 60x60 mask rotated slightly, placed at (70, 101);
        // its center must be painted, far corners of the canvas must not.
        assert_eq!(canvas.get_pixel(100, 131)[0], 255);
        assert_eq!(canvas.get_pixel(0, 0)[0], 0);
        assert_eq!(canvas.get_pixel(299, 299)[0], 0);
    }

    #[test]
    fn faces_are_processed_in_detection_order() {
        let pupils = ScriptedPupils::new();
        let mut pipeline =
            OverlayPipeline::new(&pupils, &ReferenceLandmarks, OverlaySettings::default());
        let mut canvas = RgbaImage::from_pixel(600, 600, Rgba([0, 0, 0, 255]));

        let faces = [face(100, 100, 80, 10.0), face(400, 400, 80, 9.0)];
        pipeline.run(
            &mut canvas,
            &gray(600),
            &mask(200),
            &faces,
            RenderMode::Mask,
        );

        // Eye windows sit at row - 6; two calls per face, list order kept.
        assert_eq!(*pupils.seen_rows.borrow(), vec![94, 94, 394, 394]);
    }

    #[test]
    fn reruns_are_pixel_identical() {
        let run = || {
            let pupils = ScriptedPupils::new();
            let mut pipeline =
                OverlayPipeline::new(&pupils, &ReferenceLandmarks, OverlaySettings::default());
            let mut canvas = RgbaImage::from_pixel(300, 300, Rgba([10, 20, 30, 255]));
            pipeline.run(
                &mut canvas,
                &gray(300),
                &mask(200),
                &[face(100, 100, 80, 10.0)],
                RenderMode::Mask,
            );
            canvas
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn marker_mode_draws_the_face_box() {
        let pupils = ScriptedPupils::new();
        let mut pipeline =
            OverlayPipeline::new(&pupils, &ReferenceLandmarks, OverlaySettings::default());
        let mut canvas = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 0, 255]));

        pipeline.run(
            &mut canvas,
            &gray(300),
            &mask(200),
            &[face(100, 100, 80, 10.0)],
            RenderMode::MaskWithMarkers,
        );

        // Top-left corner of the 80px box centered at (100, 100).
        let corner = canvas.get_pixel(60, 60);
        assert_eq!(corner[0], 255);
        assert_eq!(corner[1], 0);
    }
}
