use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the preprocessing pipeline
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// Input could not be read or decoded into an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Raster has a zero dimension and cannot be resized
    #[error("Cannot resize {width}x{height} image")]
    Resize { width: u32, height: u32 },

    /// Debug raster could not be written; never fatal to the pipeline
    #[error("Failed to write debug image to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Invalid file type. Supported types: PNG, JPG, JPEG, BMP, TIFF")]
    UnsupportedFormat(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Request body too large: {0}")]
    RequestTooLarge(String),

    #[error("Missing file in request")]
    MissingFile,

    #[error("Unknown OCR engine: {0}")]
    UnknownEngine(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to store upload: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PreprocessError> for OcrError {
    fn from(err: PreprocessError) -> Self {
        OcrError::PreprocessingError(err.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::InitializationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            OcrError::ProcessingError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_ERROR"),
            OcrError::PreprocessingError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PREPROCESSING_ERROR")
            }
            OcrError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT"),
            OcrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OcrError::RequestTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "REQUEST_TOO_LARGE"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::UnknownEngine(_) => (StatusCode::NOT_FOUND, "UNKNOWN_ENGINE"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        // Pipeline details stay in the logs; callers get a generic message
        let error = match &self {
            OcrError::PreprocessingError(detail) => {
                tracing::error!("Image preprocessing failed: {}", detail);
                "An error occurred during image preprocessing".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_error_maps_to_preprocessing_error() {
        let err: OcrError = PreprocessError::Resize {
            width: 0,
            height: 10,
        }
        .into();
        assert!(matches!(err, OcrError::PreprocessingError(_)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            OcrError::MissingFile.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OcrError::UnsupportedFormat("a.gif".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OcrError::ImageTooLarge { size: 2, max: 1 }
                .into_response()
                .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            OcrError::UnknownEngine("nope".into())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OcrError::from(PreprocessError::Decode("bad".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
