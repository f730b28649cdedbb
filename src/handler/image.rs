use super::{label_and_score, LazyPipeline};
use crate::backend::PipelineInput;
use crate::error::{Error, Result};
use ::image::RgbImage;
use serde_json::Value;
use std::path::Path;

const TOP_K: usize = 5;

pub struct ImageHandler {
    pub(super) pipeline: LazyPipeline,
}

impl ImageHandler {
    pub fn new(pipeline: LazyPipeline) -> Self {
        Self { pipeline }
    }

    /// `data` is a path to an image file.
    pub fn run(&self, data: &str) -> Result<String> {
        self.pipeline.ensure_ready()?;
        let image = load_image(Path::new(data))?;
        let result = self.pipeline.invoke(PipelineInput::Image(image))?;
        Self::format(&result)
    }

    /// Up to five predictions under a `Top predictions:` header. The pipeline
    /// already sorts by score.
    pub fn format(result: &Value) -> Result<String> {
        let results = result
            .as_array()
            .ok_or_else(|| Error::Execution(format!("expected a list of predictions, got {}", result)))?;

        let mut lines = Vec::with_capacity(TOP_K + 1);
        lines.push("Top predictions:".to_string());
        for entry in results.iter().take(TOP_K) {
            let (label, score) = label_and_score(entry)?;
            lines.push(format!("{}: {:.4}", label, score));
        }

        Ok(lines.join("\n"))
    }
}

/// Decodes an image file and converts it to 8-bit RGB.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let image = ::image::open(path)
        .map_err(|e| Error::InvalidInput(format!("Could not read image {:?}: {}", path, e)))?;
    Ok(image.to_rgb8())
}
