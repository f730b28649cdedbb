//! Per-category wrappers around one inference pipeline.
//!
//! A handler builds its pipeline on first use and turns the raw pipeline
//! output into the string shown to the user. Every error leaving a handler is
//! [`Error::Execution`].

pub mod audio;
pub mod image;
pub mod text;

pub use self::audio::AudioHandler;
pub use self::image::ImageHandler;
pub use self::text::TextHandler;

use crate::backend::{InferenceBackend, Pipeline, PipelineInput};
use crate::error::{Error, Result};
use crate::model::{ModelCategory, ModelMeta};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

pub enum Handler {
    Text(TextHandler),
    Image(ImageHandler),
    Audio(AudioHandler),
}

impl Handler {
    /// Picks the variant serving `meta.category`.
    pub fn for_meta(meta: &ModelMeta, backend: Option<Arc<dyn InferenceBackend>>) -> Self {
        let lazy = LazyPipeline::new(meta.clone(), backend);
        match meta.category {
            ModelCategory::TextSentiment => Handler::Text(TextHandler::new(lazy)),
            ModelCategory::ImageClassification => Handler::Image(ImageHandler::new(lazy)),
            ModelCategory::SpeechRecognition => Handler::Audio(AudioHandler::new(lazy)),
        }
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.pipeline().meta
    }

    /// Whether this handler's pipeline is the one `meta` asks for.
    pub fn serves(&self, meta: &ModelMeta) -> bool {
        let own = self.meta();
        own.model_id == meta.model_id && own.task == meta.task
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline().is_built()
    }

    pub fn ensure_ready(&self) -> Result<()> {
        guarded(|| self.pipeline().ensure_ready())
    }

    pub fn run(&self, data: &str) -> Result<String> {
        guarded(|| {
            timed(&format!("{} run", self.meta().human_name), || match self {
                Handler::Text(h) => h.run(data),
                Handler::Image(h) => h.run(data),
                Handler::Audio(h) => h.run(data),
            })
        })
    }

    fn pipeline(&self) -> &LazyPipeline {
        match self {
            Handler::Text(h) => &h.pipeline,
            Handler::Image(h) => &h.pipeline,
            Handler::Audio(h) => &h.pipeline,
        }
    }
}

/// Pipeline that is built on first use and kept afterwards.
pub struct LazyPipeline {
    meta: ModelMeta,
    backend: Option<Arc<dyn InferenceBackend>>,
    slot: Mutex<Option<Box<dyn Pipeline>>>,
    // Mirrors `slot.is_some()` so readers need not wait behind a running inference.
    built: AtomicBool,
}

impl LazyPipeline {
    pub fn new(meta: ModelMeta, backend: Option<Arc<dyn InferenceBackend>>) -> Self {
        Self {
            meta,
            backend,
            slot: Mutex::new(None),
            built: AtomicBool::new(false),
        }
    }

    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    pub fn ensure_ready(&self) -> Result<()> {
        let mut slot = self.lock();
        self.build_into(&mut slot)?;
        Ok(())
    }

    pub fn invoke(&self, input: PipelineInput) -> Result<Value> {
        let mut slot = self.lock();
        let pipeline = self.build_into(&mut slot)?;
        timed(&format!("{} {} inference", self.meta.model_id, input.kind()), || {
            pipeline.invoke(input)
        })
    }

    fn build_into<'a>(
        &self,
        slot: &'a mut Option<Box<dyn Pipeline>>,
    ) -> Result<&'a mut Box<dyn Pipeline>> {
        if slot.is_none() {
            let backend = self.backend.as_ref().ok_or_else(|| {
                Error::ConfigError(
                    "inference backend not installed (rebuild with `--features candle`)".to_string(),
                )
            })?;

            tracing::info!(
                "Loading '{}' ({}) for {}",
                self.meta.model_id,
                self.meta.task,
                self.meta.category
            );
            let pipeline = timed(&format!("{} load", self.meta.model_id), || {
                backend.load(&self.meta.task, &self.meta.model_id)
            })?;
            tracing::info!("Model '{}' ready on {} backend", self.meta.model_id, backend.name());

            *slot = Some(pipeline);
            self.built.store(true, Ordering::Release);
        }

        slot.as_mut()
            .ok_or_else(|| Error::Execution("pipeline missing after build".to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Pipeline>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs `f`, logging how long it took.
pub fn timed<T>(what: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    tracing::debug!("{} took {:.2?}", what, start.elapsed());
    out
}

/// Runs `f`, folding any failure into [`Error::Execution`].
pub fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    f().map_err(Error::into_execution)
}

/// Renders a JSON value the way a user expects to read it: strings bare,
/// everything else as JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pulls `(label, score)` out of one classification entry.
pub(crate) fn label_and_score(entry: &Value) -> Result<(String, f64)> {
    let label = entry
        .get("label")
        .map(display_value)
        .ok_or_else(|| Error::Execution(format!("result entry has no label: {}", entry)))?;
    let score = entry
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::Execution(format!("result entry has no score: {}", entry)))?;
    Ok((label, score))
}
