//! Local inference on candle. Model files come from the HuggingFace hub via
//! [`ModelDownloader`] and stay cached under the data directory.

mod audio;
mod sentiment;
mod vit;
mod whisper;

use super::{InferenceBackend, Pipeline};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::ModelDownloader;
use candle_core::Device;
use serde_json::Value;
use std::path::Path;

pub struct CandleBackend {
    downloader: ModelDownloader,
    device: Device,
}

impl CandleBackend {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            downloader: ModelDownloader::new(config)?,
            device: parse_device(&config.device)?,
        })
    }

    pub fn device_name(&self) -> String {
        format!("{:?}", self.device)
    }
}

impl InferenceBackend for CandleBackend {
    fn name(&self) -> &str {
        "candle"
    }

    fn load(&self, task: &str, model_id: &str) -> Result<Box<dyn Pipeline>> {
        let pipeline: Box<dyn Pipeline> = match task {
            "sentiment-analysis" | "text-classification" => {
                let files = self.downloader.fetch(model_id)?;
                Box::new(sentiment::SentimentPipeline::load(&files, self.device.clone())?)
            }
            "image-classification" => {
                let files = self.downloader.fetch(model_id)?;
                Box::new(vit::VitPipeline::load(&files, self.device.clone())?)
            }
            "automatic-speech-recognition" => {
                let files = self.downloader.fetch(model_id)?;
                Box::new(whisper::WhisperPipeline::load(&files, self.device.clone())?)
            }
            other => {
                return Err(Error::ConfigError(format!("Unsupported task: {}", other)));
            }
        };
        Ok(pipeline)
    }
}

pub fn parse_device(device_str: &str) -> Result<Device> {
    match device_str {
        "cpu" => Ok(Device::Cpu),
        s if s.starts_with("cuda") => {
            let parts: Vec<&str> = s.split(':').collect();
            let ordinal = if parts.len() > 1 {
                parts[1]
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidInput(format!("Invalid CUDA device: {}", s)))?
            } else {
                0
            };
            Device::new_cuda(ordinal)
                .map_err(|e| Error::ConfigError(format!("Failed to initialize CUDA device: {}", e)))
        }
        _ => Err(Error::InvalidInput(format!("Unknown device: {}", device_str))),
    }
}

fn read_model_config(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Execution(format!("Failed to read config: {}", e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Execution(format!("Failed to parse config: {}", e)))
}

/// Class names ordered by class index, from the `id2label` table in config.json.
fn id2label(config: &Value) -> Result<Vec<String>> {
    let table = config
        .get("id2label")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Execution("config.json has no id2label table".to_string()))?;

    let mut labels = vec![String::new(); table.len()];
    for (id, label) in table {
        let idx = id
            .parse::<usize>()
            .ok()
            .filter(|idx| *idx < labels.len())
            .ok_or_else(|| Error::Execution(format!("Bad id2label key: {}", id)))?;
        labels[idx] = label.as_str().unwrap_or_default().to_string();
    }
    Ok(labels)
}

/// `[{label, score}, ...]` sorted by descending score.
fn ranked(labels: &[String], probs: &[f32]) -> Value {
    let mut pairs: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));

    Value::Array(
        pairs
            .into_iter()
            .map(|(idx, score)| {
                let label = labels
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("LABEL_{}", idx));
                serde_json::json!({ "label": label, "score": score })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_device_accepts_cpu() {
        assert!(matches!(parse_device("cpu").unwrap(), Device::Cpu));
        assert!(matches!(parse_device("tpu"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_device("cuda:x"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn id2label_orders_by_index() {
        let config = json!({"id2label": {"1": "POSITIVE", "0": "NEGATIVE"}});
        assert_eq!(id2label(&config).unwrap(), ["NEGATIVE", "POSITIVE"]);
        assert!(id2label(&json!({"id2label": {"7": "x"}})).is_err());
        assert!(id2label(&json!({})).is_err());
    }

    #[test]
    fn ranked_sorts_descending() {
        let labels = vec!["cat".to_string(), "dog".to_string(), "fox".to_string()];
        let out = ranked(&labels, &[0.2, 0.7, 0.1]);

        let order: Vec<_> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["label"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(order, ["dog", "cat", "fox"]);
    }
}
