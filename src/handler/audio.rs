use super::{display_value, LazyPipeline};
use crate::backend::PipelineInput;
use crate::error::Result;
use serde_json::Value;
use std::path::PathBuf;

pub struct AudioHandler {
    pub(super) pipeline: LazyPipeline,
}

impl AudioHandler {
    pub fn new(pipeline: LazyPipeline) -> Self {
        Self { pipeline }
    }

    /// `data` is a path to an audio file; the pipeline reads it itself.
    pub fn run(&self, data: &str) -> Result<String> {
        let result = self
            .pipeline
            .invoke(PipelineInput::AudioFile(PathBuf::from(data)))?;
        Ok(Self::format(&result))
    }

    pub fn format(result: &Value) -> String {
        match result.get("text") {
            Some(text) if result.is_object() => display_value(text),
            _ => display_value(result),
        }
    }
}
