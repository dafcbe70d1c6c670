use crate::preprocessing::{PipelineConfig, RotationDirection};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docscan-ocr-server")]
#[command(about = "Handwritten document OCR server with image preprocessing")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "8000")]
    pub port: u16,

    /// Name reported by the welcome endpoint
    #[arg(long, env = "OCR_PROJECT_NAME", default_value = "Handwritten Recognition")]
    pub project_name: String,

    /// Directory uploaded files are stored in
    #[arg(long, env = "OCR_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Write every preprocessed image to --debug-path
    #[arg(long, env = "OCR_SAVE_DEBUG", default_value_t = true, action = clap::ArgAction::Set)]
    pub save_debug: bool,

    /// Where the debug image is written
    #[arg(long, env = "OCR_DEBUG_PATH", default_value = "preprocessed_image.png")]
    pub debug_path: PathBuf,

    /// Deskew rotation sign: "correct" levels text, "measured" rotates by the raw angle
    #[arg(long, env = "OCR_ROTATION", default_value = "correct")]
    pub rotation: RotationDirection,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub project_name: String,
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
    pub save_debug: bool,
    pub debug_path: PathBuf,
    pub rotation: RotationDirection,
}

impl Config {
    /// Preprocessing settings derived from the server configuration
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            save_debug: self.save_debug,
            debug_path: self.debug_path.clone(),
            rotation: self.rotation,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            project_name: "Handwritten Recognition".to_string(),
            upload_dir: PathBuf::from("uploads"),
            max_file_size: 50 * 1024 * 1024,
            save_debug: pipeline.save_debug,
            debug_path: pipeline.debug_path,
            rotation: pipeline.rotation,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            project_name: args.project_name,
            upload_dir: args.upload_dir,
            max_file_size: args.max_file_size,
            save_debug: args.save_debug,
            debug_path: args.debug_path,
            rotation: args.rotation,
        }
    }
}
