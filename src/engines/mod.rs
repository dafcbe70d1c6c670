//! OCR engine implementations
//!
//! Engines are conditionally compiled based on feature flags. The registry is
//! built once at start-up and shared through the HTTP state.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

use crate::engine::OcrEngine;
use crate::error::OcrError;
use serde::Serialize;
use std::sync::Arc;

/// Information about an available engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub supported_languages: Vec<String>,
}

/// Registry of available OCR engines
pub struct EngineRegistry {
    engines: Vec<Arc<dyn OcrEngine>>,
    default_engine: String,
}

impl EngineRegistry {
    /// Create a new engine registry with all compiled-in engines initialized
    pub fn new() -> Result<Self, OcrError> {
        #[allow(unused_mut)]
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

        #[cfg(feature = "engine-ocrs")]
        {
            tracing::info!("Initializing ocrs engine...");
            engines.push(Arc::new(ocrs::OcrsEngine::new()?));
        }

        if engines.is_empty() {
            return Err(OcrError::InitializationError(
                "No OCR engines available. Build with --features engine-ocrs".to_string(),
            ));
        }

        let default_engine = engines[0].name().to_string();
        Self::with_engines(engines, &default_engine)
    }

    /// Build a registry from already constructed engines
    pub fn with_engines(
        engines: Vec<Arc<dyn OcrEngine>>,
        default_engine: &str,
    ) -> Result<Self, OcrError> {
        if !engines.iter().any(|e| e.name() == default_engine) {
            return Err(OcrError::InitializationError(format!(
                "Default engine '{}' is not registered",
                default_engine
            )));
        }

        Ok(Self {
            engines,
            default_engine: default_engine.to_string(),
        })
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrEngine>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    /// Get the default engine
    pub fn default(&self) -> Option<Arc<dyn OcrEngine>> {
        self.get(&self.default_engine)
    }

    /// Get the default engine name
    pub fn default_name(&self) -> &str {
        &self.default_engine
    }

    /// List all available engine names
    pub fn list(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Get info about all available engines
    pub fn info(&self) -> Vec<EngineInfo> {
        self.engines
            .iter()
            .map(|e| EngineInfo {
                name: e.name(),
                description: e.description(),
                supported_languages: e.supported_languages(),
            })
            .collect()
    }
}
