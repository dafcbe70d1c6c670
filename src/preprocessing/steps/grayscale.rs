use crate::error::PreprocessError;
use image::{DynamicImage, GrayImage};

/// Convert image to single-channel luma
/// This is the foundation for every later step, which all work on `GrayImage`
pub fn apply(image: DynamicImage) -> Result<GrayImage, PreprocessError> {
    Ok(image.into_luma8())
}
