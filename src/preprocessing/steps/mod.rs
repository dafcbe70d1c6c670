//! Individual preprocessing steps

pub mod debug;
pub mod denoise;
pub mod deskew;
pub mod grayscale;
pub mod load;
pub mod morphology;
pub mod normalize;
pub mod resize;
pub mod threshold;
