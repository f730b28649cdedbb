//! Inference backends: the opaque library that turns a task and a model id
//! into something callable.
//!
//! Pipelines return loosely-typed JSON so that handlers can format whatever
//! shape a task produces:
//!
//! - classification tasks: `[{"label": ..., "score": ...}, ...]`, best first
//! - speech recognition: `{"text": ...}`

#[cfg(feature = "candle")]
pub mod candle;
#[cfg(test)]
pub mod stub;

use crate::config::Config;
use crate::error::Result;
use image::RgbImage;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

pub enum PipelineInput {
    Text(String),
    Image(RgbImage),
    AudioFile(PathBuf),
}

impl PipelineInput {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineInput::Text(_) => "text",
            PipelineInput::Image(_) => "image",
            PipelineInput::AudioFile(_) => "audio",
        }
    }
}

/// A loaded model, ready to run.
pub trait Pipeline: Send {
    fn invoke(&mut self, input: PipelineInput) -> Result<Value>;
}

pub trait InferenceBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Builds a pipeline for `task` backed by `model_id`. May download weights.
    fn load(&self, task: &str, model_id: &str) -> Result<Box<dyn Pipeline>>;
}

/// The backend compiled into this binary, if any.
#[cfg(feature = "candle")]
pub fn default_backend(config: &Config) -> Result<Option<Arc<dyn InferenceBackend>>> {
    let backend = candle::CandleBackend::new(config)?;
    tracing::info!("Using candle backend on {}", backend.device_name());
    Ok(Some(Arc::new(backend)))
}

#[cfg(not(feature = "candle"))]
pub fn default_backend(_config: &Config) -> Result<Option<Arc<dyn InferenceBackend>>> {
    tracing::warn!("Built without an inference backend; model runs will fail");
    Ok(None)
}
