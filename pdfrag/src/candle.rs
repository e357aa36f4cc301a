//! Local sentence embeddings with `all-MiniLM-L6-v2` on candle.
//!
//! Enable with the `candle` feature. The model is read from a local directory
//! holding `config.json`, `tokenizer.json` and `model.safetensors` (the layout
//! of the Hugging Face `sentence-transformers/all-MiniLM-L6-v2` repository).
//! Sentence vectors are the attention-masked mean of the last hidden state,
//! L2-normalized.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::info;

use crate::embedding::{EmbeddingProvider, EmbeddingSpace};
use crate::error::{RagError, Result};

/// Longest token sequence fed to the model; MiniLM was trained on 256.
const MAX_TOKENS: usize = 256;

struct MiniLmModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// A BERT-family sentence embedder running locally via candle.
#[derive(Clone)]
pub struct MiniLmEmbedder {
    inner: Arc<MiniLmModel>,
    space: EmbeddingSpace,
}

impl std::fmt::Debug for MiniLmEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniLmEmbedder").field("space", &self.space).finish()
    }
}

impl MiniLmEmbedder {
    /// Load the model found in `model_dir`, reporting it as `model_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if any model file is missing or invalid.
    pub fn load(model_dir: &Path, model_id: &str) -> Result<Self> {
        let fail = |what: &str, e: &dyn std::fmt::Display| {
            RagError::embedding(model_id, format!("{what} ({}): {e}", model_dir.display()))
        };

        let device = Device::cuda_if_available(0).map_err(|e| fail("device", &e))?;

        let config_text = std::fs::read_to_string(model_dir.join("config.json"))
            .map_err(|e| fail("read config.json", &e))?;
        let config: BertConfig =
            serde_json::from_str(&config_text).map_err(|e| fail("parse config.json", &e))?;
        let dimensions = serde_json::from_str::<serde_json::Value>(&config_text)
            .ok()
            .and_then(|v| v.get("hidden_size").and_then(serde_json::Value::as_u64))
            .ok_or_else(|| fail("config.json", &"missing hidden_size"))?
            as usize;

        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| fail("load tokenizer.json", &e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| fail("configure truncation", &e))?;

        let weights = model_dir.join("model.safetensors");
        // SAFETY: the weights file is memory-mapped read-only and must not be
        // modified while the model is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device) }
            .map_err(|e| fail("map model.safetensors", &e))?;
        let model = BertModel::load(vb, &config).map_err(|e| fail("build model", &e))?;

        info!(model = model_id, dimensions, device = ?device, "loaded sentence embedding model");
        Ok(Self {
            inner: Arc::new(MiniLmModel { model, tokenizer, device }),
            space: EmbeddingSpace::new(model_id, dimensions),
        })
    }
}

impl MiniLmModel {
    fn embed(&self, texts: Vec<String>) -> candle_core::Result<Vec<Vec<f32>>> {
        let encodings =
            self.tokenizer.encode_batch(texts, true).map_err(candle_core::Error::msg)?;

        let ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let masks = encodings
            .iter()
            .map(|e| Tensor::new(e.get_attention_mask(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        masked_mean_l2(&hidden, &attention_mask)?.to_device(&Device::Cpu)?.to_vec2::<f32>()
    }
}

/// Mean over the unmasked tokens of `hidden` (`[B, T, H]`), then L2 normalize.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
    let sum = (hidden * &mask_3d)?.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?;
    let mean = sum.broadcast_div(&lengths)?;
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + 1e-12)?;
    mean.broadcast_div(&norm)
}

#[async_trait]
impl EmbeddingProvider for MiniLmEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = Arc::clone(&self.inner);
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let model_id = self.space.model_id.clone();
        tokio::task::spawn_blocking(move || inner.embed(owned))
            .await
            .map_err(|e| RagError::embedding(&model_id, e))?
            .map_err(|e| RagError::embedding(&model_id, e))
    }

    fn space(&self) -> EmbeddingSpace {
        self.space.clone()
    }
}
