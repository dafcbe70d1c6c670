//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. Neural network models are
//! downloaded to the user cache directory on first start.

use crate::engine::{BoundingBox, OcrEngine, TextRegion};
use crate::error::OcrError;
use image::{DynamicImage, GrayImage};
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// Subdirectory of the user cache dir holding downloaded models
const CACHE_DIR_NAME: &str = "docscan-ocr";

/// OCR Engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: OcrsOcrEngine,
}

impl OcrsEngine {
    /// Load the detection and recognition models, downloading them if needed
    pub fn new() -> Result<Self, OcrError> {
        let detection_model = load_model(DETECTION_MODEL_URL, "text-detection.rten")?;
        let recognition_model = load_model(RECOGNITION_MODEL_URL, "text-recognition.rten")?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| OcrError::InitializationError(format!("Failed to create OCR engine: {}", e)))?;

        tracing::info!("ocrs engine initialized successfully");
        Ok(Self { engine })
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize(&self, image: &GrayImage) -> Result<Vec<TextRegion>, OcrError> {
        // ocrs wants HWC RGB bytes
        let rgb = DynamicImage::ImageLuma8(image.clone()).into_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions()).map_err(|e| {
            OcrError::ProcessingError(format!("Failed to create image source: {}", e))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to prepare input: {}", e)))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to detect words: {}", e)))?;
        let lines = self.engine.find_text_lines(&input, &words);

        let recognized = self
            .engine
            .recognize_text(&input, &lines)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let regions: Vec<TextRegion> = recognized
            .iter()
            .flatten()
            .filter_map(|line| {
                let text = line
                    .words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.trim().is_empty() {
                    return None;
                }

                let rect = line.bounding_rect();
                Some(TextRegion {
                    confidence: text_confidence(&text),
                    text,
                    bbox: BoundingBox {
                        x: rect.left(),
                        y: rect.top(),
                        width: rect.width().max(0) as u32,
                        height: rect.height().max(0) as u32,
                    },
                })
            })
            .collect();

        tracing::debug!(lines = regions.len(), "ocrs recognition finished");
        Ok(regions)
    }

    fn supported_languages(&self) -> Vec<String> {
        // ocrs currently only supports English/Latin alphabet
        vec!["eng".to_string()]
    }
}

// ============================================================================
// Confidence scoring heuristics
// ============================================================================

/// Estimate how plausible a recognised line is.
///
/// ocrs does not report per-character scores, so the line text itself is
/// scored: character mix, word lengths, whitespace ratio and runs of the same
/// character, weighted 40/30/15/15.
fn text_confidence(text: &str) -> f32 {
    match text.chars().count() {
        0 => return 0.0,
        1..=4 => return 0.5,
        _ => {}
    }

    let score = 0.40 * character_mix_score(text)
        + 0.30 * word_length_score(text)
        + 0.15 * whitespace_score(text)
        + 0.15 * repetition_score(text);

    score.clamp(0.0, 1.0)
}

/// Garbled output is heavy on symbols and light on letters
fn character_mix_score(text: &str) -> f32 {
    let mut total = 0usize;
    let mut letters = 0usize;
    let mut symbols = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_alphabetic() {
            letters += 1;
        } else if !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation() {
            symbols += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }

    let symbol_score = 1.0 - (10.0 * symbols as f32 / total as f32).min(1.0);
    let letter_score = (1.5 * letters as f32 / total as f32).min(1.0);
    0.6 * symbol_score + 0.4 * letter_score
}

/// Prefer an average word length of 4-8 characters and few one-letter words
fn word_length_score(text: &str) -> f32 {
    let lengths: Vec<usize> = text.split_whitespace().map(str::len).collect();
    if lengths.is_empty() {
        return 0.5;
    }

    let average = lengths.iter().sum::<usize>() / lengths.len();
    let average_score = match average {
        0..=1 => 0.3,
        2..=3 => 0.7,
        4..=8 => 1.0,
        9..=12 => 0.8,
        _ => 0.4,
    };

    let singles = lengths.iter().filter(|&&len| len == 1).count() as f32 / lengths.len() as f32;
    average_score * (1.0 - (1.5 * singles).min(0.5))
}

/// Ordinary prose is roughly 10-25% whitespace
fn whitespace_score(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }

    let percent = 100 * text.chars().filter(|c| c.is_whitespace()).count() / total;
    match percent {
        0..=5 => 0.5,
        6..=10 => 0.8,
        11..=25 => 1.0,
        26..=40 => 0.7,
        _ => 0.3,
    }
}

/// Long runs of one character ("aaaa", "####") usually mean confusion
fn repetition_score(text: &str) -> f32 {
    let mut longest = 1;
    let mut run = 0;
    let mut previous = None;

    for c in text.chars() {
        run = if Some(c) == previous && !c.is_whitespace() {
            run + 1
        } else {
            1
        };
        longest = longest.max(run);
        previous = Some(c);
    }

    match longest {
        0..=3 => 1.0,
        4..=5 => 0.8,
        6..=10 => 0.5,
        _ => 0.2,
    }
}

// ============================================================================
// Model download
// ============================================================================

fn load_model(url: &str, filename: &str) -> Result<Model, OcrError> {
    let path = ensure_model_downloaded(url, filename)?;
    Model::load_file(&path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to load model {}: {}", filename, e))
    })
}

/// Return the cached model path, downloading the file first if it is missing
fn ensure_model_downloaded(url: &str, filename: &str) -> Result<PathBuf, OcrError> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME);

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create cache directory: {}", e))
    })?;

    let model_path = cache_dir.join(filename);
    if model_path.exists() {
        tracing::info!("Using cached model from {:?}", model_path);
    } else {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &model_path)?;
        tracing::info!("Downloaded {} to {:?}", filename, model_path);
    }

    Ok(model_path)
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download model: {}", e)))?;

    let body = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    // Write next to the target and rename, so an interrupted download never
    // leaves a truncated model in the cache
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut partial = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create model file: {}", e))
    })?;
    partial
        .write_all(&body)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write model file: {}", e)))?;
    partial
        .persist(path)
        .map_err(|e| OcrError::InitializationError(format!("Failed to store model file: {}", e)))?;

    Ok(())
}
