//! Handwritten document OCR server
//!
//! Uploaded images go through a fixed preprocessing pipeline (upscale, CLAHE,
//! bilateral filter, adaptive threshold, closing, deskew) before being handed
//! to an OCR engine.

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod preprocessing;
pub mod server;
