//! Ollama embedding provider.
//!
//! Semantic embeddings via Ollama's local API using models like
//! nomic-embed-text. Ollama has no batch endpoint, so a batch is issued as
//! sequential single-text requests; the surrounding `Embedder` handles
//! retries and cross-batch concurrency.

use super::super::provider::EmbeddingProvider;
use pdfchat_core::{AppError, AppResult, ProviderError, ProviderFault};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Ollama embedding provider using the local API.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    /// HTTP client for API requests
    client: Client,
    /// Ollama API base URL
    base_url: String,
    /// Model name (e.g., "nomic-embed-text")
    model: String,
    /// Expected embedding dimensionality
    dimensions: usize,
}

/// Request payload for the Ollama embeddings API.
#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

/// Response from the Ollama embeddings API.
#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Error response from the Ollama API.
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaEmbeddingProvider {
    /// Create a new Ollama embedding provider.
    pub fn new(model: &str, dimensions: usize, endpoint: Option<&str>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Config(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = endpoint
            .map(|s| s.to_string())
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url,
            model: model.to_string(),
            dimensions,
        })
    }

    /// Embed a single text (no retries; the Embedder owns retry policy).
    async fn embed_single(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        tracing::debug!("Sending embedding request to {}", url);

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            let fault = if e.is_timeout() {
                ProviderFault::Timeout
            } else if e.is_connect() {
                ProviderFault::Backend
            } else {
                ProviderFault::Protocol
            };
            ProviderError::new(fault, format!("Failed to send request to Ollama: {}", e))
        })?;

        let status = response.status();

        if !status.is_success() {
            let fault = match status.as_u16() {
                429 => ProviderFault::RateLimited,
                401 | 403 => ProviderFault::Auth,
                s if s >= 500 => ProviderFault::Backend,
                _ => ProviderFault::Protocol,
            };

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                return Err(ProviderError::new(
                    fault,
                    format!("Ollama API error ({}): {}", status, error_response.error),
                ));
            }

            return Err(ProviderError::new(
                fault,
                format!("Ollama API error ({}): {}", status, error_text),
            ));
        }

        let response_body: EmbeddingResponse = response.json().await.map_err(|e| {
            ProviderError::new(
                ProviderFault::Protocol,
                format!("Failed to parse Ollama response: {}", e),
            )
        })?;

        if response_body.embedding.len() != self.dimensions {
            return Err(ProviderError::new(
                ProviderFault::Protocol,
                format!(
                    "Unexpected embedding dimensions: got {}, expected {}",
                    response_body.embedding.len(),
                    self.dimensions
                ),
            ));
        }

        Ok(response_body.embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Embedding batch of {} texts", texts.len());

        // No batch API; embed sequentially within the batch
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let embedding = self.embed_single(text).await?;
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }
}
