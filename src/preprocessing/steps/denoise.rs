use crate::error::PreprocessError;
use image::{GrayImage, Luma};

/// Neighbourhood diameter in pixels
const DIAMETER: i32 = 9;
/// Intensity falloff: larger values let more dissimilar neighbours contribute
const SIGMA_COLOR: f32 = 75.0;
/// Spatial falloff
const SIGMA_SPACE: f32 = 75.0;

/// Apply a bilateral filter to reduce noise
/// Weights fall off with both distance and intensity difference, so flat
/// regions are smoothed while stroke edges are not blurred across
pub fn apply(image: GrayImage) -> Result<GrayImage, PreprocessError> {
    Ok(bilateral_filter(&image, DIAMETER, SIGMA_COLOR, SIGMA_SPACE))
}

fn bilateral_filter(img: &GrayImage, diameter: i32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let radius = diameter / 2;

    // Circular support with precomputed spatial weights
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let mut offsets: Vec<(i32, i32, f32)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            offsets.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let color_weights: Vec<f32> = (0..256)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    GrayImage::from_fn(width, height, |x, y| {
        let center = img.get_pixel(x, y).0[0] as i32;
        let mut sum = 0.0f32;
        let mut weight_sum = 0.0f32;

        for &(dx, dy, space_weight) in &offsets {
            let sx = reflect_101(x as i32 + dx, width as i32);
            let sy = reflect_101(y as i32 + dy, height as i32);
            let value = img.get_pixel(sx, sy).0[0] as i32;

            let w = space_weight * color_weights[(value - center).unsigned_abs() as usize];
            sum += w * value as f32;
            weight_sum += w;
        }

        Luma([(sum / weight_sum).round().clamp(0.0, 255.0) as u8])
    })
}

/// Mirror an out-of-range coordinate without repeating the edge pixel (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(p: i32, len: i32) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut p = p.rem_euclid(period);
    if p >= len {
        p = period - p;
    }
    p as u32
}
