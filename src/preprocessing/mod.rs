//! Image preprocessing for handwriting OCR
//!
//! A fixed pipeline that turns an uploaded photo or scan into a clean,
//! upright, binarized page.

pub mod hough;
pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, PipelineConfig, PreprocessingResult, StepTiming};
pub use steps::deskew::RotationDirection;
