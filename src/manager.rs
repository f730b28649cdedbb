use crate::backend::InferenceBackend;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::model::{InputType, ModelCategory, ModelMeta};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Single entry point for running models. Owns one handler per category,
/// created on first request. A request for a different model of the same
/// category replaces that category's handler.
pub struct ModelManager {
    backend: Option<Arc<dyn InferenceBackend>>,
    handlers: Mutex<HashMap<ModelCategory, Arc<Handler>>>,
}

impl ModelManager {
    pub fn new(backend: Option<Arc<dyn InferenceBackend>>) -> Self {
        Self {
            backend,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.name())
    }

    /// Runs `meta` on `data`: text for text models, a file path otherwise.
    /// Blocks for as long as loading and inference take.
    pub fn run(&self, meta: &ModelMeta, input_type: InputType, data: &str) -> Result<String> {
        if meta.input_type() != input_type {
            return Err(Error::InvalidInput(format!(
                "'{}' takes {} input, not {}",
                meta.human_name,
                meta.input_type(),
                input_type
            )));
        }

        let handler = self.handler_for(meta);
        tracing::debug!("Dispatching '{}' to {} handler", meta.human_name, meta.category);
        handler.run(data)
    }

    /// Whether the handler for `category` exists and has built its pipeline.
    pub fn is_loaded(&self, category: ModelCategory) -> bool {
        self.lock()
            .get(&category)
            .is_some_and(|handler| handler.is_ready())
    }

    pub fn loaded_categories(&self) -> Vec<ModelCategory> {
        ModelCategory::ALL
            .into_iter()
            .filter(|c| self.is_loaded(*c))
            .collect()
    }

    fn handler_for(&self, meta: &ModelMeta) -> Arc<Handler> {
        let mut handlers = self.lock();
        match handlers.get(&meta.category) {
            Some(handler) if handler.serves(meta) => return handler.clone(),
            Some(handler) => tracing::info!(
                "Switching {} from '{}' to '{}'",
                meta.category,
                handler.meta().model_id,
                meta.model_id
            ),
            None => tracing::debug!("Creating handler for {}", meta.category),
        }

        let handler = Arc::new(Handler::for_meta(meta, self.backend.clone()));
        handlers.insert(meta.category, handler.clone());
        handler
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ModelCategory, Arc<Handler>>> {
        self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
