use crate::error::PreprocessError;
use image::{imageops::FilterType, GrayImage};

/// Upscale factor, expressed as a ratio so the output size is an exact floor
const SCALE_NUM: u64 = 3;
const SCALE_DEN: u64 = 2;

/// Upscale by 150% with a cubic kernel
/// Cubic keeps stroke edges smoother than nearest/linear, which the adaptive
/// threshold later depends on
pub fn apply(image: GrayImage) -> Result<GrayImage, PreprocessError> {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = scaled_dimensions(width, height)?;

    Ok(image::imageops::resize(
        &image,
        new_width,
        new_height,
        FilterType::CatmullRom,
    ))
}

/// `floor(dim * 1.5)` on both axes
pub fn scaled_dimensions(width: u32, height: u32) -> Result<(u32, u32), PreprocessError> {
    if width == 0 || height == 0 {
        return Err(PreprocessError::Resize { width, height });
    }

    let scale = |dim: u32| (dim as u64 * SCALE_NUM / SCALE_DEN).min(u32::MAX as u64) as u32;
    Ok((scale(width), scale(height)))
}
