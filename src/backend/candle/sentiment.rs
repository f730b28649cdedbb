use super::{id2label, ranked, read_model_config};
use crate::backend::{Pipeline, PipelineInput};
use crate::error::{Error, Result};
use crate::model::ModelFiles;
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use serde_json::Value;
use tokenizers::Tokenizer;

/// DistilBERT with the sequence-classification head used by
/// `DistilBertForSequenceClassification` checkpoints.
pub struct SentimentPipeline {
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    device: Device,
}

impl SentimentPipeline {
    pub fn load(files: &ModelFiles, device: Device) -> Result<Self> {
        tracing::info!("Loading text classifier from: {:?}", files.model_dir);

        let raw_config = read_model_config(&files.config)?;
        let config: DistilBertConfig = serde_json::from_value(raw_config.clone())
            .map_err(|e| Error::Execution(format!("Unsupported text model config: {}", e)))?;
        let labels = id2label(&raw_config)?;
        let dim = dim_of(&raw_config)?;

        let tokenizer_path = files.tokenizer.as_ref().ok_or_else(|| {
            Error::Execution("Text model ships without tokenizer.json".to_string())
        })?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| Error::Execution(format!("Failed to load tokenizer: {}", e)))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, &device)?
        };

        let model = DistilBertModel::load(vb.pp("distilbert"), &config)?;
        let pre_classifier = candle_nn::linear(dim, dim, vb.pp("pre_classifier"))?;
        let classifier = candle_nn::linear(dim, labels.len(), vb.pp("classifier"))?;

        tracing::info!("Text classifier loaded");
        tracing::info!("  Hidden size: {}", dim);
        tracing::info!("  Labels: {}", labels.join(", "));

        Ok(Self {
            model,
            pre_classifier,
            classifier,
            tokenizer,
            labels,
            device,
        })
    }

    fn classify(&self, text: &str) -> Result<Value> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Execution(format!("Tokenization failed: {}", e)))?;
        let token_ids = encoding.get_ids();
        tracing::debug!("Classifying {} tokens", token_ids.len());

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        // One unpadded sequence, so no key position is masked out.
        let mask = Tensor::zeros((1, token_ids.len()), DType::U8, &self.device)?;

        let hidden = self.model.forward(&input_ids, &mask)?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&cls)?.relu()?;
        let logits = self.classifier.forward(&pooled)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?
            .i(0)?
            .to_vec1::<f32>()?;

        Ok(ranked(&self.labels, &probs))
    }
}

impl Pipeline for SentimentPipeline {
    fn invoke(&mut self, input: PipelineInput) -> Result<Value> {
        match input {
            PipelineInput::Text(text) => self.classify(&text),
            other => Err(Error::InvalidInput(format!(
                "text classifier cannot take {} input",
                other.kind()
            ))),
        }
    }
}

fn dim_of(config: &Value) -> Result<usize> {
    config
        .get("dim")
        .or_else(|| config.get("hidden_size"))
        .and_then(Value::as_u64)
        .map(|d| d as usize)
        .ok_or_else(|| Error::Execution("Could not determine hidden size".to_string()))
}
