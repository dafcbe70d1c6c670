use crate::config::Config;
use crate::engine::{join_text, mean_confidence, OcrEngine, TextRegion};
use crate::engines::{EngineInfo, EngineRegistry};
use crate::error::OcrError;
use crate::preprocessing::{Pipeline, PreprocessingResult};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Upload file name extensions accepted by the OCR routes
pub const SUPPORTED_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".bmp", ".tiff"];

/// Room for the multipart envelope on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engines: Arc<EngineRegistry>,
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, engines: EngineRegistry) -> Self {
        Self {
            engines: Arc::new(engines),
            pipeline: Arc::new(Pipeline::new(config.pipeline())),
            config: Arc::new(config),
        }
    }
}

#[derive(Serialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub project: String,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub lines: Vec<TextRegion>,
    pub confidence: f32,
    pub engine: String,
    pub file_path: PathBuf,
    pub preprocessing: PreprocessingResult,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
}

/// Response of the preprocessing-only route
#[derive(Serialize)]
pub struct PreprocessResponse {
    pub message: String,
    pub file_path: PathBuf,
    pub preprocessing: PreprocessingResult,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct PipelineInfo {
    pub save_debug: bool,
    pub debug_path: PathBuf,
    pub rotation: &'static str,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub default_engine: String,
    pub available_engines: Vec<EngineInfo>,
    pub supported_formats: Vec<&'static str>,
    pub max_file_size_bytes: usize,
    pub pipeline: PipelineInfo,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/ocr/upload", post(handle_upload))
        .route("/ocr/upload/:engine", post(handle_upload_with_engine))
        .route("/ocr/preprocess", post(handle_preprocess))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.upload_dir)?;
    let engines = EngineRegistry::new()?;
    tracing::info!("Available engines: {:?}", engines.list());
    tracing::info!("Default engine: {}", engines.default_name());

    let addr = format!("{}:{}", config.host, config.port);
    let app = router(AppState::new(config, engines));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(WelcomeResponse {
        message: "Welcome".to_string(),
        project: state.config.project_name.clone(),
    })
}

/// Handle OCR requests with the default engine
async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, OcrError> {
    let engine = state
        .engines
        .default()
        .ok_or_else(|| OcrError::Internal("No default engine configured".to_string()))?;
    recognize_upload(state, engine, multipart).await
}

/// Handle OCR requests with an explicitly named engine
async fn handle_upload_with_engine(
    State(state): State<AppState>,
    UrlPath(engine_name): UrlPath<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, OcrError> {
    let engine = state
        .engines
        .get(&engine_name)
        .ok_or(OcrError::UnknownEngine(engine_name))?;
    recognize_upload(state, engine, multipart).await
}

async fn recognize_upload(
    state: AppState,
    engine: Arc<dyn OcrEngine>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<OcrResponse>), OcrError> {
    let start = Instant::now();
    let upload = read_upload(&state, multipart).await?;

    let upload_dir = state.config.upload_dir.clone();
    let pipeline = state.pipeline.clone();
    let engine_name = engine.name().to_string();

    let (file_path, preprocessing, lines) = tokio::task::spawn_blocking(move || {
        let file_path = store_upload(&upload_dir, &upload.file_name, &upload.data)?;
        // A later upload under the same name may replace the stored file
        let preprocessing = pipeline.process_bytes(&upload.data)?;
        let lines = engine.recognize(&preprocessing.image)?;
        Ok::<_, OcrError>((file_path, preprocessing, lines))
    })
    .await
    .map_err(|e| OcrError::Internal(format!("OCR task failed: {}", e)))??;

    let text = join_text(&lines);
    let confidence = mean_confidence(&lines);
    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        engine = %engine_name,
        file = %file_path.display(),
        lines = lines.len(),
        skew_angle = ?preprocessing.skew_angle,
        "OCR completed in {}ms, confidence: {:.2}, text length: {}",
        processing_time_ms,
        confidence,
        text.len()
    );

    let warnings = preprocessing.warnings.clone();
    Ok((
        StatusCode::CREATED,
        Json(OcrResponse {
            text,
            lines,
            confidence,
            engine: engine_name,
            file_path,
            preprocessing,
            processing_time_ms,
            warnings,
        }),
    ))
}

/// Store and preprocess an upload without running recognition
async fn handle_preprocess(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, OcrError> {
    let upload = read_upload(&state, multipart).await?;

    let upload_dir = state.config.upload_dir.clone();
    let pipeline = state.pipeline.clone();

    let (file_path, preprocessing) = tokio::task::spawn_blocking(move || {
        let file_path = store_upload(&upload_dir, &upload.file_name, &upload.data)?;
        // A later upload under the same name may replace the stored file
        let preprocessing = pipeline.process_bytes(&upload.data)?;
        Ok::<_, OcrError>((file_path, preprocessing))
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Preprocessing task failed: {}", e)))??;

    tracing::info!(
        file = %file_path.display(),
        total_time_ms = preprocessing.total_time_ms,
        "Image preprocessed successfully"
    );

    Ok((
        StatusCode::CREATED,
        Json(PreprocessResponse {
            message: "File uploaded and preprocessed successfully".to_string(),
            file_path,
            preprocessing,
        }),
    ))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = state.pipeline.config();
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_engine: state.engines.default_name().to_string(),
        available_engines: state.engines.info(),
        supported_formats: SUPPORTED_EXTENSIONS.to_vec(),
        max_file_size_bytes: state.config.max_file_size,
        pipeline: PipelineInfo {
            save_debug: pipeline.save_debug,
            debug_path: pipeline.debug_path.clone(),
            rotation: pipeline.rotation.as_str(),
        },
    })
}

/// A validated file taken from the multipart form
struct Upload {
    file_name: String,
    data: Bytes,
}

/// Pull the `file` field out of the form, checking its name and size
async fn read_upload(state: &AppState, mut multipart: Multipart) -> Result<Upload, OcrError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            // Ignore unknown fields
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !is_supported_image(&file_name) {
            tracing::warn!("Invalid file type: {:?}", file_name);
            return Err(OcrError::UnsupportedFormat(file_name));
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > state.config.max_file_size {
            return Err(OcrError::ImageTooLarge {
                size: data.len(),
                max: state.config.max_file_size,
            });
        }

        tracing::info!(file = %file_name, bytes = data.len(), "Received file upload");
        return Ok(Upload { file_name, data });
    }

    Err(OcrError::MissingFile)
}

fn multipart_error(err: MultipartError) -> OcrError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        OcrError::RequestTooLarge(err.body_text())
    } else {
        OcrError::InvalidRequest(format!("Failed to parse multipart: {}", err.body_text()))
    }
}

/// Case-insensitive check of the file name extension
pub fn is_supported_image(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Final path component of a client-supplied name, with either separator style
fn base_name(file_name: &str) -> Option<&str> {
    file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

/// Write the upload into `dir` under its base name
///
/// Data goes to a temporary file in the same directory first and is then
/// renamed into place, so readers never observe a half-written upload.
pub fn store_upload(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf, OcrError> {
    let name = base_name(file_name)
        .ok_or_else(|| OcrError::InvalidRequest(format!("Invalid file name: {:?}", file_name)))?;

    std::fs::create_dir_all(dir)
        .map_err(|e| OcrError::StorageError(format!("Failed to create upload directory: {}", e)))?;

    let mut temp_file = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(dir)
        .map_err(|e| OcrError::StorageError(format!("Failed to create temp file: {}", e)))?;

    temp_file
        .write_all(data)
        .map_err(|e| OcrError::StorageError(format!("Failed to write upload: {}", e)))?;

    let path = dir.join(name);
    temp_file
        .persist(&path)
        .map_err(|e| OcrError::StorageError(format!("Failed to save upload: {}", e)))?;

    tracing::debug!("File saved successfully at: {}", path.display());
    Ok(path)
}
