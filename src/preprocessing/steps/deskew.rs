use crate::error::PreprocessError;
use crate::preprocessing::hough::{self, HoughParams, LineSegment};
use image::{GrayImage, Luma};
use imageproc::edges::canny;
use serde::Serialize;
use std::str::FromStr;

/// Canny hysteresis thresholds (3x3 Sobel aperture)
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

const HOUGH: HoughParams = HoughParams {
    rho: 1.0,
    theta_degrees: 1.0,
    threshold: 100,
    min_line_length: 50,
    max_line_gap: 5,
};

/// Which way to rotate relative to the measured skew angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationDirection {
    /// Rotate by the negated angle, bringing measured lines back to level
    #[default]
    Correct,
    /// Rotate by the measured angle as-is
    Measured,
}

impl RotationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Measured => "measured",
        }
    }

    fn rotation_for(&self, skew: f32) -> f32 {
        match self {
            Self::Correct => -skew,
            Self::Measured => skew,
        }
    }
}

impl FromStr for RotationDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correct" => Ok(Self::Correct),
            "measured" => Ok(Self::Measured),
            other => Err(format!(
                "unknown rotation direction '{}' (expected 'correct' or 'measured')",
                other
            )),
        }
    }
}

/// Output of the deskew step
#[derive(Debug, Clone)]
pub struct Deskewed {
    pub image: GrayImage,
    /// Estimated skew in degrees; `None` when no lines were found
    pub angle: Option<f32>,
}

/// Deskew image by detecting the dominant line angle and rotating it level
/// Uses Canny edges, a probabilistic Hough transform and the median segment
/// angle. When no segment is found the input is returned untouched.
pub fn apply(image: GrayImage, direction: RotationDirection) -> Result<Deskewed, PreprocessError> {
    let Some(angle) = estimate_skew(&image) else {
        tracing::debug!("No line segments found, skipping rotation");
        return Ok(Deskewed { image, angle: None });
    };

    let rotation = direction.rotation_for(angle);
    tracing::debug!(angle, rotation, "Rotating to correct skew");

    if rotation == 0.0 {
        return Ok(Deskewed {
            image,
            angle: Some(angle),
        });
    }

    Ok(Deskewed {
        image: rotate_about_center(&image, rotation),
        angle: Some(angle),
    })
}

/// Median angle of the detected line segments, in degrees
pub fn estimate_skew(img: &GrayImage) -> Option<f32> {
    let segments = detect_line_segments(img);
    tracing::debug!(segments = segments.len(), "Line segments detected");
    median(segments.iter().map(LineSegment::angle_degrees).collect())
}

/// Canny edge map followed by probabilistic Hough segment detection
pub fn detect_line_segments(img: &GrayImage) -> Vec<LineSegment> {
    let (width, height) = img.dimensions();
    // Sobel and non-maximum suppression need a 3x3 neighbourhood
    if width < 3 || height < 3 {
        return Vec::new();
    }

    let edges = canny(img, CANNY_LOW, CANNY_HIGH);
    hough::detect_segments(&edges, &HOUGH)
}

fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Rotate about the image centre by `degrees` (positive turns content from +x
/// towards +y), keeping the canvas size. Bicubic sampling; pixels that map
/// outside the source take the nearest edge value.
pub fn rotate_about_center(img: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let (sin, cos) = degrees.to_radians().sin_cos();

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        // Inverse mapping: where does this output pixel come from
        let sx = cx + cos * dx + sin * dy;
        let sy = cy - sin * dx + cos * dy;
        Luma([sample_bicubic(img, sx, sy)])
    })
}

fn sample_bicubic(img: &GrayImage, x: f32, y: f32) -> u8 {
    let (width, height) = (img.width() as i64, img.height() as i64);
    let x0 = x.floor();
    let y0 = y.floor();
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut value = 0.0f32;
    for (j, wy) in wy.iter().enumerate() {
        let sy = (y0 + j as i64 - 1).clamp(0, height - 1) as u32;
        for (i, wx) in wx.iter().enumerate() {
            let sx = (x0 + i as i64 - 1).clamp(0, width - 1) as u32;
            value += wx * wy * img.get_pixel(sx, sy).0[0] as f32;
        }
    }

    value.round().clamp(0.0, 255.0) as u8
}

/// Cubic convolution weights (a = -0.75) for the four taps around fraction `t`
fn cubic_weights(t: f32) -> [f32; 4] {
    const A: f32 = -0.75;
    let w0 = ((A * (t + 1.0) - 5.0 * A) * (t + 1.0) + 8.0 * A) * (t + 1.0) - 4.0 * A;
    let w1 = ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0;
    let u = 1.0 - t;
    let w2 = ((A + 2.0) * u - (A + 3.0)) * u * u + 1.0;
    [w0, w1, w2, 1.0 - w0 - w1 - w2]
}
