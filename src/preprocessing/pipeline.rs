use crate::error::PreprocessError;
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::steps;
use super::steps::deskew::{Deskewed, RotationDirection};

/// Pipeline options that are not fixed by the algorithm itself
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Write the final image to `debug_path` after every run
    pub save_debug: bool,
    pub debug_path: PathBuf,
    pub rotation: RotationDirection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            save_debug: true,
            debug_path: PathBuf::from("preprocessed_image.png"),
            rotation: RotationDirection::default(),
        }
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed image (not serialized)
    #[serde(skip)]
    pub image: GrayImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
    /// Skew measured by the deskew step, in degrees
    pub skew_angle: Option<f32>,
    /// Where the debug image was written, if it was
    pub debug_path: Option<PathBuf>,
    /// Non-fatal problems encountered along the way
    pub warnings: Vec<String>,
}

/// Fixed preprocessing pipeline:
/// grayscale, upscale, CLAHE, bilateral filter, adaptive threshold,
/// closing, deskew, then an optional debug write.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the image at `path` and run the full pipeline on it
    pub fn process_path(&self, path: &Path) -> Result<PreprocessingResult, PreprocessError> {
        let start = Instant::now();
        let mut timings = Vec::new();

        let image = run_step("load", path, &mut timings, steps::load::apply)?;
        self.finish(image, start, timings)
    }

    /// Decode an in-memory upload and run the full pipeline on it
    pub fn process_bytes(&self, data: &[u8]) -> Result<PreprocessingResult, PreprocessError> {
        let start = Instant::now();
        let mut timings = Vec::new();

        let image = run_step("load", data, &mut timings, steps::load::from_bytes)?;
        self.finish(image, start, timings)
    }

    /// Run the pipeline on an already decoded image
    pub fn process(&self, image: DynamicImage) -> Result<PreprocessingResult, PreprocessError> {
        self.finish(image, Instant::now(), Vec::new())
    }

    fn finish(
        &self,
        image: DynamicImage,
        start: Instant,
        mut timings: Vec<StepTiming>,
    ) -> Result<PreprocessingResult, PreprocessError> {
        let img = run_step("grayscale", image, &mut timings, steps::grayscale::apply)?;
        let img = run_step("resize", img, &mut timings, steps::resize::apply)?;
        let img = run_step("normalize", img, &mut timings, steps::normalize::apply)?;
        let img = run_step("denoise", img, &mut timings, steps::denoise::apply)?;
        let img = run_step("threshold", img, &mut timings, steps::threshold::apply)?;
        let img = run_step("close", img, &mut timings, steps::morphology::apply)?;

        let rotation = self.config.rotation;
        let Deskewed { image: img, angle } =
            run_step("deskew", img, &mut timings, |img| steps::deskew::apply(img, rotation))?;

        let mut warnings = Vec::new();
        let mut debug_path = None;
        if self.config.save_debug {
            let path = self.config.debug_path.as_path();
            let step_start = Instant::now();
            match steps::debug::save(&img, path) {
                Ok(()) => debug_path = Some(path.to_path_buf()),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not save debug image");
                    warnings.push(e.to_string());
                }
            }
            timings.push(StepTiming {
                name: "debug_sink".to_string(),
                time_ms: step_start.elapsed().as_millis() as u64,
            });
        }

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            total_time_ms,
            width = img.width(),
            height = img.height(),
            skew_angle = ?angle,
            "Preprocessing complete"
        );

        Ok(PreprocessingResult {
            image: img,
            total_time_ms,
            steps: timings,
            skew_angle: angle,
            debug_path,
            warnings,
        })
    }
}

fn run_step<I, O, F>(
    name: &str,
    input: I,
    timings: &mut Vec<StepTiming>,
    step_fn: F,
) -> Result<O, PreprocessError>
where
    F: FnOnce(I) -> Result<O, PreprocessError>,
{
    let step_start = Instant::now();
    let result = step_fn(input)?;
    timings.push(StepTiming {
        name: name.to_string(),
        time_ms: step_start.elapsed().as_millis() as u64,
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    fn no_debug() -> PipelineConfig {
        PipelineConfig {
            save_debug: false,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.save_debug);
        assert_eq!(config.debug_path, PathBuf::from("preprocessed_image.png"));
        assert_eq!(config.rotation, RotationDirection::Correct);
    }

    #[test]
    fn test_pipeline_upscales_and_binarizes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(40, 30, |x, y| {
            if (x / 5 + y / 5) % 2 == 0 {
                Rgb([230, 225, 220])
            } else {
                Rgb([30, 35, 40])
            }
        }));

        let result = Pipeline::new(no_debug()).process(img).unwrap();

        assert_eq!(result.image.dimensions(), (60, 45));
        assert!(result.image.pixels().any(|p| p.0[0] == 0));
        assert!(result.image.pixels().any(|p| p.0[0] == 255));
        assert_eq!(result.debug_path, None);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_step_timings_are_recorded_in_order() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([200])));
        let result = Pipeline::new(no_debug()).process(img).unwrap();

        let names: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["grayscale", "resize", "normalize", "denoise", "threshold", "close", "deskew"]
        );
        assert_eq!(result.skew_angle, None);
    }

    #[test]
    fn test_debug_sink_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            debug_path: dir.path().join("no-such-dir").join("out.png"),
            ..PipelineConfig::default()
        };
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([200])));

        let result = Pipeline::new(config).process(img).unwrap();

        assert_eq!(result.image.dimensions(), (30, 30));
        assert_eq!(result.debug_path, None);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.steps.last().unwrap().name, "debug_sink");
    }

    #[test]
    fn test_debug_sink_writes_final_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let config = PipelineConfig {
            debug_path: path.clone(),
            ..PipelineConfig::default()
        };
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([200])));

        let result = Pipeline::new(config).process(img).unwrap();

        assert_eq!(result.debug_path.as_deref(), Some(path.as_path()));
        let written = image::open(&path).unwrap().into_luma8();
        assert_eq!(written, result.image);
    }

    #[test]
    fn test_process_path_reports_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();

        let err = Pipeline::new(no_debug()).process_path(&path).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_process_bytes_times_load_step() {
        let mut buffer = Cursor::new(Vec::new());
        GrayImage::from_pixel(24, 16, Luma([180]))
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();

        let result = Pipeline::new(no_debug())
            .process_bytes(buffer.get_ref())
            .unwrap();

        assert_eq!(result.image.dimensions(), (36, 24));
        assert_eq!(result.steps[0].name, "load");
        assert_eq!(result.steps.len(), 8);
    }

    #[test]
    fn test_process_bytes_rejects_empty_upload() {
        let err = Pipeline::new(no_debug()).process_bytes(&[]).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }
}
