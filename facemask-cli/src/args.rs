//! Command-line argument definitions for the facemask binary.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Overlay a translucent face mask on every detected face in a photo.
#[derive(Debug, Parser)]
#[command(name = "facemask", author, version, about)]
pub struct MaskArgs {
    /// Source photo (jpg, jpeg or png).
    #[arg(long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// Destination image; the format follows the file extension.
    #[arg(long = "out", value_name = "FILE")]
    pub output: PathBuf,

    /// Minimum face size in pixels.
    #[arg(long = "min", default_value_t = 20)]
    pub min_size: u32,

    /// Maximum face size in pixels.
    #[arg(long = "max", default_value_t = 1000)]
    pub max_size: u32,

    /// Window shift per scan step, as a fraction of the window size.
    #[arg(long = "shift", default_value_t = 0.1)]
    pub shift_factor: f64,

    /// Window growth between scan passes. Must be greater than 1.05.
    #[arg(long = "scale", default_value_t = 1.1)]
    pub scale_factor: f64,

    /// Scan-window rotation: 0.0 is 0 radians, 1.0 is 2*pi radians.
    #[arg(long = "angle", default_value_t = 0.0)]
    pub angle: f64,

    /// Intersection-over-union threshold for merging overlapping detections.
    #[arg(long = "iou", default_value_t = 0.2)]
    pub iou_threshold: f32,

    /// Optional settings JSON; command-line flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Additionally draw the face box and the located eye/landmark points.
    #[arg(long, action = ArgAction::SetTrue)]
    pub markers: bool,

    /// Suppress the banner and the progress spinner.
    #[arg(long, short, action = ArgAction::SetTrue)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let args = MaskArgs::parse_from(["facemask", "--in", "a.jpg", "--out", "b.png"]);
        assert_eq!(args.min_size, 20);
        assert_eq!(args.max_size, 1000);
        assert!((args.shift_factor - 0.1).abs() < f64::EPSILON);
        assert!((args.scale_factor - 1.1).abs() < f64::EPSILON);
        assert!((args.angle).abs() < f64::EPSILON);
        assert!((args.iou_threshold - 0.2).abs() < f32::EPSILON);
        assert!(!args.markers);
        assert!(!args.quiet);
    }

    #[test]
    fn input_and_output_are_required() {
        assert!(MaskArgs::try_parse_from(["facemask", "--in", "a.jpg"]).is_err());
        assert!(MaskArgs::try_parse_from(["facemask", "--out", "b.png"]).is_err());
    }

    #[test]
    fn overrides_parse() {
        let args = MaskArgs::parse_from([
            "facemask", "--in", "a.jpg", "--out", "b.png", "--min", "60", "--scale", "1.2",
            "--markers", "-q",
        ]);
        assert_eq!(args.min_size, 60);
        assert!((args.scale_factor - 1.2).abs() < f64::EPSILON);
        assert!(args.markers);
        assert!(args.quiet);
    }
}
