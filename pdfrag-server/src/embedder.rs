//! Picks the embedding backend for the configured model.

use std::sync::Arc;

use pdfrag::{EmbeddingProvider, HashEmbedder, RagConfig};
use tracing::warn;

/// Build the embedder for `config`.
///
/// With the `candle` feature and a `model_dir`, the local MiniLM model is
/// loaded. Every other combination falls back to the hashing embedder
/// (`hash-bow-384`), which does not understand meaning.
///
/// # Errors
///
/// Returns an error if the configured model directory cannot be loaded.
#[cfg(feature = "candle")]
pub fn build_embedder(config: &RagConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    use anyhow::Context;

    if let Some(dir) = &config.model_dir {
        let embedder = pdfrag::MiniLmEmbedder::load(dir, &config.embedding_model)
            .with_context(|| format!("failed to load model from {}", dir.display()))?;
        return Ok(Arc::new(embedder));
    }
    Ok(hashing_fallback(config))
}

/// Build the embedder for `config`.
///
/// This build has no model runtime, so the hashing embedder (`hash-bow-384`)
/// is always used. Rebuild with `--features candle` to load `model_dir`.
#[cfg(not(feature = "candle"))]
pub fn build_embedder(config: &RagConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if config.model_dir.is_some() {
        warn!("model_dir is set but this build lacks the `candle` feature");
    }
    Ok(hashing_fallback(config))
}

fn hashing_fallback(config: &RagConfig) -> Arc<dyn EmbeddingProvider> {
    warn!(
        model = %config.embedding_model,
        "no local model configured, using the hashing embedder"
    );
    Arc::new(HashEmbedder::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_falls_back_to_hashing() {
        let config = RagConfig::default();
        assert_eq!(config.embedding_model, "all-MiniLM-L6-v2");

        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.space().model_id, "hash-bow-384");
    }

    #[cfg(not(feature = "candle"))]
    #[test]
    fn model_dir_without_candle_still_uses_hashing() {
        let config = RagConfig { model_dir: Some("/models/minilm".into()), ..RagConfig::default() };
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.space().model_id, "hash-bow-384");
    }
}
