use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{InputType, ModelCategory, ModelMeta};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Entry as written in `catalog.toml`. The category stays a string until
/// [`ModelCategory::from_str`](std::str::FromStr) has vetted it.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    human_name: String,
    task: String,
    model_id: String,
    category: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: Vec<CatalogEntry>,
}

/// Ordered catalog of selectable models.
#[derive(Debug, Clone)]
pub struct Registry {
    models: Vec<ModelMeta>,
}

impl Registry {
    pub fn builtin() -> Self {
        Self {
            models: vec![
                ModelMeta::new(
                    "DistilBERT Sentiment (SST-2)",
                    "sentiment-analysis",
                    "distilbert-base-uncased-finetuned-sst-2-english",
                    ModelCategory::TextSentiment,
                    "A lightweight DistilBERT fine-tuned on SST-2 for binary sentiment classification. \
                     Input: short English text. Output: label (POSITIVE/NEGATIVE) with score.",
                ),
                ModelMeta::new(
                    "ViT Base Image Classifier",
                    "image-classification",
                    "google/vit-base-patch16-224",
                    ModelCategory::ImageClassification,
                    "Vision Transformer (ViT) base model fine-tuned for generic image classification. \
                     Input: an image; Output: top class predictions with scores.",
                ),
                ModelMeta::new(
                    "Whisper Tiny (EN) ASR",
                    "automatic-speech-recognition",
                    "openai/whisper-tiny.en",
                    ModelCategory::SpeechRecognition,
                    "OpenAI Whisper tiny English model for speech-to-text. \
                     Input: audio file (wav/mp3/flac). Output: transcribed text.",
                ),
            ],
        }
    }

    /// Built-in models followed by any entries in the catalog file.
    pub fn load(config: &Config) -> Result<Self> {
        let mut registry = Self::builtin();

        if config.catalog_path.exists() {
            registry.extend_from_file(&config.catalog_path)?;
        }

        Ok(registry)
    }

    pub fn from_models(models: Vec<ModelMeta>) -> Result<Self> {
        let mut seen = HashSet::new();
        for model in &models {
            if !seen.insert(model.human_name.as_str()) {
                return Err(Error::ConfigError(format!(
                    "Duplicate model name in catalog: {}",
                    model.human_name
                )));
            }
        }
        Ok(Self { models })
    }

    fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let catalog: CatalogFile = toml::from_str(&content)?;

        let mut models = self.models.clone();
        for entry in catalog.models {
            let category = entry.category.parse::<ModelCategory>()?;
            models.push(ModelMeta::new(
                entry.human_name,
                entry.task,
                entry.model_id,
                category,
                entry.description,
            ));
        }

        *self = Self::from_models(models)?;
        tracing::debug!("Registry holds {} models after reading {:?}", self.models.len(), path);
        Ok(())
    }

    /// Models whose category serves `input_type`, in declaration order.
    pub fn models_for(&self, input_type: InputType) -> Vec<&ModelMeta> {
        let cats = input_type.categories();
        self.models
            .iter()
            .filter(|m| cats.contains(&m.category))
            .collect()
    }

    pub fn find_by_human_name(&self, name: &str) -> Option<&ModelMeta> {
        self.models.iter().find(|m| m.human_name == name)
    }

    pub fn list_models(&self) -> &[ModelMeta] {
        &self.models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, category: ModelCategory) -> ModelMeta {
        ModelMeta::new(name, "task", "org/model", category, "")
    }

    #[test]
    fn models_for_filters_by_input_type() {
        let registry = Registry::builtin();

        for input_type in InputType::ALL {
            let models = registry.models_for(input_type);
            assert_eq!(models.len(), 1);
            assert!(models.iter().all(|m| m.input_type() == input_type));
        }
    }

    #[test]
    fn models_for_preserves_declaration_order() {
        let registry = Registry::from_models(vec![
            meta("b-text", ModelCategory::TextSentiment),
            meta("an-image", ModelCategory::ImageClassification),
            meta("a-text", ModelCategory::TextSentiment),
        ])
        .unwrap();

        let names: Vec<_> = registry
            .models_for(InputType::Text)
            .into_iter()
            .map(|m| m.human_name.as_str())
            .collect();
        assert_eq!(names, ["b-text", "a-text"]);
    }

    #[test]
    fn models_for_without_matches_is_empty() {
        let registry = Registry::from_models(vec![meta("only-text", ModelCategory::TextSentiment)]).unwrap();
        assert!(registry.models_for(InputType::Audio).is_empty());
    }

    #[test]
    fn find_by_human_name_exact_match_only() {
        let registry = Registry::builtin();

        let found = registry.find_by_human_name("ViT Base Image Classifier").unwrap();
        assert_eq!(found.model_id, "google/vit-base-patch16-224");

        assert!(registry.find_by_human_name("").is_none());
        assert!(registry.find_by_human_name("vit base image classifier").is_none());
        assert!(registry.find_by_human_name("ViT Base Image Classifier ").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Registry::from_models(vec![
            meta("same", ModelCategory::TextSentiment),
            meta("same", ModelCategory::SpeechRecognition),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn load_appends_catalog_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().to_path_buf()).unwrap();
        fs::write(
            &config.catalog_path,
            r#"
[[models]]
human_name = "Twitter RoBERTa Sentiment"
task = "text-classification"
model_id = "cardiffnlp/twitter-roberta-base-sentiment-latest"
category = "text-sentiment"
description = "RoBERTa tuned on tweets."
"#,
        )
        .unwrap();

        let registry = Registry::load(&config).unwrap();
        let names: Vec<_> = registry
            .models_for(InputType::Text)
            .into_iter()
            .map(|m| m.human_name.as_str())
            .collect();
        assert_eq!(names, ["DistilBERT Sentiment (SST-2)", "Twitter RoBERTa Sentiment"]);
    }

    #[test]
    fn load_rejects_unknown_category() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().to_path_buf()).unwrap();
        fs::write(
            &config.catalog_path,
            r#"
[[models]]
human_name = "Video Captioner"
task = "video-captioning"
model_id = "org/video"
category = "video"
"#,
        )
        .unwrap();

        let err = Registry::load(&config).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("Unsupported category"));
    }

    #[test]
    fn load_rejects_name_clash_with_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().to_path_buf()).unwrap();
        fs::write(
            &config.catalog_path,
            r#"
[[models]]
human_name = "Whisper Tiny (EN) ASR"
task = "automatic-speech-recognition"
model_id = "openai/whisper-base.en"
category = "speech-recognition"
"#,
        )
        .unwrap();

        assert!(matches!(Registry::load(&config), Err(Error::ConfigError(_))));
    }

    #[test]
    fn load_without_catalog_is_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(Registry::load(&config).unwrap().list_models().len(), 3);
    }
}
