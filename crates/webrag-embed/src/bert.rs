use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use webrag_core::error::{Error, Result};
use webrag_core::traits::Embedder;
use webrag_core::types::EmbeddingVector;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{encode_batch, load_tokenizer, HfTokenCounter};

fn candle_err(e: candle_core::Error) -> Error {
    Error::embedding(format!("model inference failed: {e}"))
}

/// Sentence-transformers style BERT encoder running locally on candle:
/// token states are mean-pooled over the attention mask and L2-normalized.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    /// Load `config.json`, `tokenizer.json` and `model.safetensors` (or
    /// `pytorch_model.bin`) from `model_dir`. `max_len` is capped by the
    /// model's position embeddings.
    pub fn load(model_dir: &Path, model_name: &str, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!("Loading {} from {}", model_name, model_dir.display());

        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let shown = config_path.display();
        let config_text = fs::read_to_string(&config_path)
            .map_err(|e| Error::embedding(format!("failed to read {shown}: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_text)
            .map_err(|e| Error::embedding(format!("failed to parse {shown}: {e}")))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config).map_err(candle_err)?;

        let short_name = model_name.rsplit('/').next().unwrap_or(model_name);
        let embedder = Self {
            model,
            tokenizer,
            device,
            id: format!("local:{short_name}"),
            dim: config.hidden_size,
            max_len: max_len.min(config.max_position_embeddings),
            pad_id,
        };
        info!(
            model = %embedder.id,
            dim = embedder.dim,
            max_len = embedder.max_len,
            "embedding model loaded"
        );
        Ok(embedder)
    }

    /// Counter over this model's own tokenizer, for chunking.
    #[must_use]
    pub fn token_counter(&self) -> HfTokenCounter {
        HfTokenCounter::new(self.tokenizer.clone(), self.id.clone())
    }

    fn forward(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) =
            encode_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like().map_err(candle_err)?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(candle_err)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(candle_err)?;
        pooled
            .to_device(&Device::Cpu)
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec2::<f32>())
            .map_err(candle_err)
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let rows = self.forward(texts)?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis(), "embedded batch");
        Ok(rows.into_iter().map(EmbeddingVector::new).collect())
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return candle_core::safetensors::load(&safetensors, device).map_err(candle_err);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let tensors = candle_core::pickle::read_all(&pickle).map_err(candle_err)?;
        return Ok(tensors.into_iter().collect());
    }
    Err(Error::embedding(format!(
        "no model.safetensors or pytorch_model.bin in {}",
        model_dir.display()
    )))
}

/// Locate a model directory: `models/<name>` or `../models/<name>`, where
/// `<name>` is the last path segment of `model_name`.
pub fn resolve_model_dir(model_name: &str) -> Result<PathBuf> {
    let short_name = model_name.rsplit('/').next().unwrap_or(model_name);
    for base in ["models", "../models"] {
        let candidate = Path::new(base).join(short_name);
        if candidate.join("config.json").exists() {
            info!("Using model dir: {}", candidate.display());
            return Ok(candidate);
        }
    }
    Err(Error::embedding(format!(
        "could not locate model directory for {model_name}; \
         set embedding.model_dir (APP_EMBEDDING__MODEL_DIR)"
    )))
}
