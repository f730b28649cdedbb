use super::{label_and_score, LazyPipeline};
use crate::backend::PipelineInput;
use crate::error::{Error, Result};
use serde_json::Value;

pub struct TextHandler {
    pub(super) pipeline: LazyPipeline,
}

impl TextHandler {
    pub fn new(pipeline: LazyPipeline) -> Self {
        Self { pipeline }
    }

    pub fn run(&self, data: &str) -> Result<String> {
        let result = self.pipeline.invoke(PipelineInput::Text(data.to_string()))?;
        Self::format(&result)
    }

    /// Best classification as `Label: <label> | Score: <score>`.
    pub fn format(result: &Value) -> Result<String> {
        let best = result
            .as_array()
            .and_then(|results| results.first())
            .ok_or_else(|| Error::Execution(format!("no classification results in {}", result)))?;

        let (label, score) = label_and_score(best)?;
        Ok(format!("Label: {} | Score: {:.4}", label, score))
    }
}
