use crate::config::Config;
use crate::error::{Error, Result};
use hf_hub::api::sync::{Api, ApiBuilder};
use std::path::{Path, PathBuf};

/// Local copies of the files a pipeline needs.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model_dir: PathBuf,
    pub config: PathBuf,
    pub weights: PathBuf,
    pub tokenizer: Option<PathBuf>,
}

pub struct ModelDownloader {
    api: Api,
}

impl ModelDownloader {
    pub fn new(config: &Config) -> Result<Self> {
        let api = ApiBuilder::new()
            .with_cache_dir(config.models_dir.clone())
            .build()
            .map_err(|e| Error::DownloadFailed(e.to_string()))?;
        Ok(Self { api })
    }

    /// Fetches (or reuses from cache) the files for `hf_repo_id`.
    pub fn fetch(&self, hf_repo_id: &str) -> Result<ModelFiles> {
        tracing::info!("Fetching model files from HuggingFace: {}", hf_repo_id);

        let repo = self.api.model(hf_repo_id.to_string());

        let config = repo
            .get("config.json")
            .map_err(|e| Error::DownloadFailed(format!("Could not find config: {}", e)))?;

        let weights = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .map_err(|e| Error::DownloadFailed(format!("Could not find model file: {}", e)))?;

        // Vision models ship without a tokenizer.
        let tokenizer = match repo.get("tokenizer.json") {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!("No tokenizer.json for {}: {}", hf_repo_id, e);
                None
            }
        };

        let model_dir = weights
            .parent()
            .ok_or_else(|| Error::DownloadFailed("Invalid model path".to_string()))?
            .to_path_buf();

        let weights = Self::ensure_safetensors(&model_dir)?.unwrap_or(weights);

        tracing::info!("Model files for '{}' ready in {:?}", hf_repo_id, model_dir);

        Ok(ModelFiles {
            model_dir,
            config,
            weights,
            tokenizer,
        })
    }

    /// Converts `pytorch_model.bin` into `model.safetensors` next to it.
    /// Returns the safetensors path when one is available.
    #[cfg(feature = "candle")]
    fn ensure_safetensors(model_dir: &Path) -> Result<Option<PathBuf>> {
        use candle_core::pickle;

        let pytorch_file = model_dir.join("pytorch_model.bin");
        let safetensors_file = model_dir.join("model.safetensors");

        if safetensors_file.exists() {
            return Ok(Some(safetensors_file));
        }

        if !pytorch_file.exists() {
            return Ok(None);
        }

        tracing::info!("Converting pytorch_model.bin to model.safetensors...");

        let tensors_vec = pickle::read_all(&pytorch_file)
            .map_err(|e| Error::DownloadFailed(format!("Failed to read PyTorch file: {}", e)))?;

        tracing::info!("Loading {} tensors from PyTorch model", tensors_vec.len());

        let tensors: std::collections::HashMap<_, _> = tensors_vec.into_iter().collect();

        candle_core::safetensors::save(&tensors, &safetensors_file)
            .map_err(|e| Error::DownloadFailed(format!("Failed to save SafeTensors: {}", e)))?;

        tracing::info!("Converted to SafeTensors format");

        if let Err(e) = std::fs::remove_file(&pytorch_file) {
            tracing::warn!("Could not remove pytorch_model.bin: {}", e);
        } else {
            tracing::info!("Removed pytorch_model.bin to save space");
        }

        Ok(Some(safetensors_file))
    }

    #[cfg(not(feature = "candle"))]
    fn ensure_safetensors(model_dir: &Path) -> Result<Option<PathBuf>> {
        let safetensors_file = model_dir.join("model.safetensors");
        Ok(safetensors_file.exists().then_some(safetensors_file))
    }
}
