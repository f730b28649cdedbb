use super::{id2label, ranked, read_model_config};
use crate::backend::{Pipeline, PipelineInput};
use crate::error::{Error, Result};
use crate::model::ModelFiles;
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Module, VarBuilder};
use candle_transformers::models::vit;
use image::imageops::FilterType;
use image::RgbImage;
use serde_json::Value;

const IMAGE_SIZE: u32 = 224;
const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const STD: [f32; 3] = [0.5, 0.5, 0.5];

pub struct VitPipeline {
    model: vit::Model,
    labels: Vec<String>,
    device: Device,
}

impl VitPipeline {
    pub fn load(files: &ModelFiles, device: Device) -> Result<Self> {
        tracing::info!("Loading image classifier from: {:?}", files.model_dir);

        let raw_config = read_model_config(&files.config)?;
        let labels = id2label(&raw_config)?;

        let image_size = raw_config.get("image_size").and_then(Value::as_u64);
        if image_size.is_some_and(|s| s != IMAGE_SIZE as u64) {
            return Err(Error::Execution(format!(
                "Only {}px ViT checkpoints are supported",
                IMAGE_SIZE
            )));
        }

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, &device)?
        };
        let model = vit::Model::new(&vit::Config::vit_base_patch16_224(), labels.len(), vb)?;

        tracing::info!("Image classifier loaded with {} classes", labels.len());

        Ok(Self {
            model,
            labels,
            device,
        })
    }

    fn classify(&self, image: &RgbImage) -> Result<Value> {
        let pixels = preprocess(image);
        let input = Tensor::from_vec(
            pixels,
            (3, IMAGE_SIZE as usize, IMAGE_SIZE as usize),
            &self.device,
        )?
        .unsqueeze(0)?;

        let logits = self.model.forward(&input)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?
            .i(0)?
            .to_vec1::<f32>()?;

        Ok(ranked(&self.labels, &probs))
    }
}

impl Pipeline for VitPipeline {
    fn invoke(&mut self, input: PipelineInput) -> Result<Value> {
        match input {
            PipelineInput::Image(image) => self.classify(&image),
            other => Err(Error::InvalidInput(format!(
                "image classifier cannot take {} input",
                other.kind()
            ))),
        }
    }
}

/// Resizes to 224x224 and lays the pixels out channel-first, normalized.
fn preprocess(image: &RgbImage) -> Vec<f32> {
    let resized = image::imageops::resize(image, IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle);
    let plane = (IMAGE_SIZE * IMAGE_SIZE) as usize;

    let mut out = vec![0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.0;
            out[c * plane + i] = (value - MEAN[c]) / STD[c];
        }
    }
    out
}
