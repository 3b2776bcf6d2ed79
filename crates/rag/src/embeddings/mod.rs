//! Embedding engine for the ingestion and query paths.
//!
//! The `Embedder` wraps a provider with batching, bounded concurrency and
//! retry policy. Providers stay free of retry logic so backoff is applied
//! exactly once, at the call site that issues the network request.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use futures::future::try_join_all;
use pdfchat_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Maximum retry attempts per batch for transient provider faults
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Concurrent in-flight batches per embedder
const MAX_CONCURRENT_BATCHES: usize = 4;

/// Batching, rate-limiting embedding front end.
///
/// All vectors produced by one `Embedder` share the provider's fixed
/// dimensionality for the lifetime of the process. A multi-batch `embed`
/// call is all-or-nothing: if any batch exhausts its retry budget the
/// whole call fails and no partial results are returned.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    limiter: Arc<Semaphore>,
}

impl Embedder {
    /// Create an embedder over a provider with the given batch-size limit.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            limiter: Arc::new(Semaphore::new(MAX_CONCURRENT_BATCHES)),
        }
    }

    /// Fixed dimensionality of every vector this embedder produces.
    pub fn dimension(&self) -> usize {
        self.provider.dimensions()
    }

    /// Provider name for logging.
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Model identifier for logging.
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed texts, preserving input order.
    ///
    /// Splits the input into provider-sized batches and runs them with
    /// bounded concurrency.
    ///
    /// # Errors
    /// - `InvalidInput` when any text is empty
    /// - `EmbeddingUnavailable` when a batch fails after the retry budget
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "cannot embed empty text (index {})",
                    i
                )));
            }
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {}, batch size: {})",
            texts.len(),
            self.provider_name(),
            self.model_name(),
            self.batch_size
        );

        let futures = texts
            .chunks(self.batch_size)
            .map(|batch| self.embed_batch_with_retries(batch));

        // try_join_all preserves order and fails the whole call if any
        // batch fails, so no partial result can leak to the caller
        let batch_results = try_join_all(futures).await?;
        let embeddings: Vec<Vec<f32>> = batch_results.into_iter().flatten().collect();

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            embeddings.len(),
            self.dimension()
        );

        Ok(embeddings)
    }

    /// Embed a single text (convenience for the query path).
    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::EmbeddingUnavailable("no embedding returned".to_string()))
    }

    /// Run one batch through the provider with exponential backoff on
    /// transient faults.
    async fn embed_batch_with_retries(&self, batch: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| AppError::EmbeddingUnavailable("rate limiter closed".to_string()))?;

        let mut attempt = 0u32;

        loop {
            match self.provider.embed_batch(batch).await {
                Ok(vectors) => {
                    self.validate_batch(batch.len(), &vectors)?;
                    return Ok(vectors);
                }
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    tracing::warn!(
                        "Embedding batch failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        MAX_RETRIES,
                        backoff_ms,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    tracing::error!("Embedding batch failed permanently: {}", e);
                    return Err(AppError::EmbeddingUnavailable(e.to_string()));
                }
            }
        }
    }

    /// Validate a provider batch result against the embedder contract.
    fn validate_batch(&self, expected_len: usize, vectors: &[Vec<f32>]) -> AppResult<()> {
        if vectors.len() != expected_len {
            return Err(AppError::EmbeddingUnavailable(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                expected_len
            )));
        }

        let dim = self.dimension();
        for vector in vectors {
            if vector.len() != dim {
                return Err(AppError::EmbeddingUnavailable(format!(
                    "provider returned {}-dimensional vector, expected {}",
                    vector.len(),
                    dim
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfchat_core::{ProviderError, ProviderFault};
    use std::sync::Mutex;

    /// Scripted provider: fails `failures` times, then succeeds. Records
    /// the size of every batch it receives.
    #[derive(Debug)]
    struct ScriptedProvider {
        dimensions: usize,
        failures: Mutex<u32>,
        fault: ProviderFault,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn new(dimensions: usize, failures: u32, fault: ProviderFault) -> Self {
            Self {
                dimensions,
                failures: Mutex::new(failures),
                fault,
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted-v1"
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.batch_sizes.lock().unwrap().push(texts.len());

            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ProviderError::new(self.fault, "scripted failure"));
            }

            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; self.dimensions];
                    v[0] = t.len() as f32;
                    v
                })
                .collect())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text number {}", i)).collect()
    }

    #[tokio::test]
    async fn test_embed_batches_input() {
        let provider = Arc::new(ScriptedProvider::new(8, 0, ProviderFault::Backend));
        let embedder = Embedder::new(provider.clone(), 4);

        let embeddings = embedder.embed(&texts(10)).await.unwrap();
        assert_eq!(embeddings.len(), 10);

        let sizes = provider.batch_sizes.lock().unwrap().clone();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_embed_preserves_order() {
        let provider = Arc::new(ScriptedProvider::new(8, 0, ProviderFault::Backend));
        let embedder = Embedder::new(provider, 3);

        let input = texts(7);
        let embeddings = embedder.embed(&input).await.unwrap();

        for (text, vector) in input.iter().zip(embeddings.iter()) {
            assert_eq!(vector[0], text.len() as f32);
        }
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let provider = Arc::new(ScriptedProvider::new(8, 2, ProviderFault::RateLimited));
        let embedder = Embedder::new(provider.clone(), 10);

        let embeddings = embedder.embed(&texts(3)).await.unwrap();
        assert_eq!(embeddings.len(), 3);

        // 2 failed attempts + 1 success
        assert_eq!(provider.batch_sizes.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion() {
        let provider = Arc::new(ScriptedProvider::new(8, 10, ProviderFault::Timeout));
        let embedder = Embedder::new(provider.clone(), 10);

        let err = embedder.embed(&texts(2)).await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingUnavailable(_)));

        // Initial attempt + MAX_RETRIES
        assert_eq!(
            provider.batch_sizes.lock().unwrap().len() as u32,
            1 + MAX_RETRIES
        );
    }

    #[tokio::test]
    async fn test_permanent_fault_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(8, 10, ProviderFault::Auth));
        let embedder = Embedder::new(provider.clone(), 10);

        let err = embedder.embed(&texts(2)).await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingUnavailable(_)));
        assert_eq!(provider.batch_sizes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let provider = Arc::new(ScriptedProvider::new(8, 0, ProviderFault::Backend));
        let embedder = Embedder::new(provider, 10);

        let err = embedder
            .embed(&["ok".to_string(), "  ".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_input_is_empty_output() {
        let provider = Arc::new(ScriptedProvider::new(8, 0, ProviderFault::Backend));
        let embedder = Embedder::new(provider.clone(), 10);

        let embeddings = embedder.embed(&[]).await.unwrap();
        assert!(embeddings.is_empty());
        assert!(provider.batch_sizes.lock().unwrap().is_empty());
    }
}
