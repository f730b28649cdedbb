use super::audio;
use crate::backend::{Pipeline, PipelineInput};
use crate::error::{Error, Result};
use crate::model::ModelFiles;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, model::Whisper, Config};
use serde_json::Value;
use std::path::Path;
use tokenizers::Tokenizer;

// Multilingual checkpoints have a larger vocabulary than the `.en` ones.
const MULTILINGUAL_VOCAB: usize = 51865;

pub struct WhisperPipeline {
    model: Whisper,
    tokenizer: Tokenizer,
    config: Config,
    mel_filters: Vec<f32>,
    prompt: Vec<u32>,
    eot_token: u32,
    device: Device,
}

impl WhisperPipeline {
    pub fn load(files: &ModelFiles, device: Device) -> Result<Self> {
        tracing::info!("Loading speech recognizer from: {:?}", files.model_dir);

        let content = std::fs::read_to_string(&files.config)
            .map_err(|e| Error::Execution(format!("Failed to read config: {}", e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Execution(format!("Unsupported whisper config: {}", e)))?;

        let tokenizer_path = files.tokenizer.as_ref().ok_or_else(|| {
            Error::Execution("Speech model ships without tokenizer.json".to_string())
        })?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| Error::Execution(format!("Failed to load tokenizer: {}", e)))?;

        let token = |name: &str| {
            tokenizer
                .token_to_id(name)
                .ok_or_else(|| Error::Execution(format!("Tokenizer has no {} token", name)))
        };

        let mut prompt = vec![token(m::SOT_TOKEN)?];
        if config.vocab_size >= MULTILINGUAL_VOCAB {
            prompt.push(token("<|en|>")?);
        }
        prompt.push(token(m::TRANSCRIBE_TOKEN)?);
        prompt.push(token(m::NO_TIMESTAMPS_TOKEN)?);
        let eot_token = token(m::EOT_TOKEN)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, &device)?
        };
        let model = Whisper::load(&vb, config.clone())?;

        let mel_filters = audio::mel_filters(config.num_mel_bins, m::N_FFT, m::SAMPLE_RATE as f32);

        tracing::info!("Speech recognizer loaded");
        tracing::info!("  Mel bins: {}", config.num_mel_bins);
        tracing::info!("  Decoder layers: {}", config.decoder_layers);

        Ok(Self {
            model,
            tokenizer,
            config,
            mel_filters,
            prompt,
            eot_token,
            device,
        })
    }

    fn transcribe(&mut self, path: &Path) -> Result<Value> {
        let (samples, rate) = audio::decode_file(path)?;
        let pcm = audio::resample_linear(&samples, rate, m::SAMPLE_RATE as u32);

        let mel = m::audio::pcm_to_mel(&self.config, &pcm, &self.mel_filters);
        let n_mels = self.config.num_mel_bins;
        let mel_len = mel.len();
        let mel = Tensor::from_vec(mel, (1, n_mels, mel_len / n_mels), &self.device)?;
        let (_, _, mel_frames) = mel.dims3()?;

        let mut segments = Vec::new();
        for (seek, segment_size) in windows(content_frames(pcm.len(), mel_frames)) {
            let segment = mel.narrow(2, seek, segment_size)?;
            let text = self.decode_segment(&segment)?;
            tracing::debug!("Segment at frame {}: {:?}", seek, text);
            if !text.is_empty() {
                segments.push(text);
            }
        }

        Ok(serde_json::json!({ "text": segments.join(" ") }))
    }

    /// Greedy decoding of one 30 s window.
    fn decode_segment(&mut self, mel: &Tensor) -> Result<String> {
        let audio_features = self.model.encoder.forward(mel, true)?;
        let max_len = self.config.max_target_positions / 2;

        let mut tokens = self.prompt.clone();
        for step in 0..max_len {
            let tokens_t = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&tokens_t, &audio_features, step == 0)?;

            let (_, seq_len, _) = ys.dims3()?;
            let mut logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?
                .to_vec1::<f32>()?;

            for &id in &self.config.suppress_tokens {
                if let Some(logit) = logits.get_mut(id as usize) {
                    *logit = f32::NEG_INFINITY;
                }
            }

            let next = argmax(&logits);
            if next == self.eot_token {
                break;
            }
            tokens.push(next);
        }

        let text = self
            .tokenizer
            .decode(&tokens[self.prompt.len()..], true)
            .map_err(|e| Error::Execution(format!("Detokenization failed: {}", e)))?;
        Ok(text.trim().to_string())
    }
}

impl Pipeline for WhisperPipeline {
    fn invoke(&mut self, input: PipelineInput) -> Result<Value> {
        match input {
            PipelineInput::AudioFile(path) => self.transcribe(&path),
            other => Err(Error::InvalidInput(format!(
                "speech recognizer cannot take {} input",
                other.kind()
            ))),
        }
    }
}

/// Mel frames backed by real samples. `pcm_to_mel` pads the tail with
/// silence, which must not be decoded on its own.
fn content_frames(samples: usize, mel_frames: usize) -> usize {
    usize::min(samples.div_ceil(m::HOP_LENGTH), mel_frames)
}

/// `(start, len)` of each window of at most 30 s over `frames` mel frames.
fn windows(frames: usize) -> Vec<(usize, usize)> {
    (0..frames)
        .step_by(m::N_FRAMES)
        .map(|start| (start, usize::min(frames - start, m::N_FRAMES)))
        .collect()
}

fn argmax(values: &[f32]) -> u32 {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx as u32)
        .unwrap_or(0)
}
