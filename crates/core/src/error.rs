//! Error types for the pdfchat pipeline.
//!
//! This module defines a unified error enum covering the pipeline's failure
//! taxonomy (invalid input, embedding, index, generation) plus the ambient
//! categories (configuration, I/O, serialization), and the normalized
//! provider-fault contract used by the retry loops.

use thiserror::Error;

/// Unified error type for the pdfchat pipeline.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or empty document/query; never retried
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Embedding provider exhausted its retry budget; no partial batch
    /// results were stored
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Vector index backend failure, distinct from an empty result set
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Language-model call failed; the conversation turn was not recorded
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

/// Fault classes a provider call can surface.
///
/// Every embedding or language-model call is normalized into this enum at
/// the boundary that issues the network request, so retry policy never has
/// to inspect provider-specific payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFault {
    /// Provider rejected the call due to rate limiting
    RateLimited,
    /// The call exceeded its deadline
    Timeout,
    /// Credentials missing or rejected
    Auth,
    /// Provider refused the content (generation only)
    ContentFiltered,
    /// Malformed request or unparseable response
    Protocol,
    /// Provider-side failure (5xx, connection refused)
    Backend,
}

impl ProviderFault {
    /// Whether a fault of this class is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderFault::RateLimited | ProviderFault::Timeout | ProviderFault::Backend
        )
    }
}

/// A classified failure from an embedding or language-model provider.
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    /// Fault class driving retry policy
    pub kind: ProviderFault,
    /// Human-readable detail from the provider
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderFault, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the fault is transient (retryable with backoff).
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}
