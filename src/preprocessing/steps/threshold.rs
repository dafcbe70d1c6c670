use crate::error::PreprocessError;
use image::{GrayImage, Luma};

/// Adaptive threshold parameters
const BLOCK_SIZE: usize = 11;
const OFFSET: f32 = 2.0;

/// Apply Gaussian adaptive thresholding
/// Each pixel is compared against the Gaussian-weighted mean of its 11x11
/// neighbourhood minus a small offset, which tolerates uneven lighting across
/// the page. Output is strictly 0 or 255.
pub fn apply(image: GrayImage) -> Result<GrayImage, PreprocessError> {
    Ok(adaptive_gaussian_threshold(&image, BLOCK_SIZE, OFFSET))
}

fn adaptive_gaussian_threshold(img: &GrayImage, block_size: usize, offset: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let local_mean = gaussian_mean(img, block_size);

    GrayImage::from_fn(width, height, |x, y| {
        let idx = y as usize * width as usize + x as usize;
        let threshold = local_mean[idx] - offset;
        let pixel = img.get_pixel(x, y).0[0] as f32;
        if pixel > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Normalized Gaussian kernel; sigma follows the usual rule for a given window size
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let raw: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Separable Gaussian blur with replicated borders, kept in floating point
fn gaussian_mean(img: &GrayImage, block_size: usize) -> Vec<f32> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let kernel = gaussian_kernel(block_size);
    let half = (block_size / 2) as isize;
    let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;

    let src: Vec<f32> = img.as_raw().iter().map(|&v| v as f32).collect();

    let mut horizontal = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            horizontal[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * row[clamp(x as isize + k as isize - half, width)])
                .sum();
        }
    }

    let mut vertical = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            vertical[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * horizontal[clamp(y as isize + k as isize - half, height) * width + x])
                .sum();
        }
    }

    vertical
}
