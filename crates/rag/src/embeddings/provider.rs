//! Embedding provider trait and factory.

use pdfchat_core::{AppError, AppResult, ProviderError};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// A provider maps a batch of texts to equal-length vectors of a fixed
/// dimensionality. Faults are surfaced as classified `ProviderError`s;
/// retry policy lives in the `Embedder` wrapper, never in providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "hash", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensionality
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// The result has the same length and order as the input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Create an embedding provider by name.
pub fn create_provider(
    provider: &str,
    model: &str,
    dimensions: usize,
    endpoint: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider {
        "hash" => {
            let provider = super::providers::hash::HashProvider::new(dimensions);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = super::providers::ollama::OllamaEmbeddingProvider::new(
                model, dimensions, endpoint,
            )?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: hash, ollama",
            provider
        ))),
    }
}
