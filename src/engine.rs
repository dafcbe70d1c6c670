use crate::error::OcrError;
use image::GrayImage;
use serde::Serialize;

/// Axis-aligned box in preprocessed-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One recognised region of text, usually a line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Join region texts with single spaces, in engine order
pub fn join_text(regions: &[TextRegion]) -> String {
    regions
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mean region confidence, 0.0 when nothing was recognised
pub fn mean_confidence(regions: &[TextRegion]) -> f32 {
    if regions.is_empty() {
        return 0.0;
    }
    regions.iter().map(|r| r.confidence).sum::<f32>() / regions.len() as f32
}

/// Trait that all OCR engines must implement
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognise text in an already preprocessed image
    fn recognize(&self, image: &GrayImage) -> Result<Vec<TextRegion>, OcrError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}
