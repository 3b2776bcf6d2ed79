//! Vector index abstraction for document passages.
//!
//! Defines a trait for provider-agnostic vector storage and retrieval.

use crate::types::{Document, IndexStats, Passage, ScoredPassage, SearchFilter};
use pdfchat_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Atomic per-document upsert (all passages visible together or not at all)
/// - Nearest-neighbor search over cosine similarity (top-k, optional filter)
/// - Per-document deletion
/// - Statistics
///
/// Backend failures surface as `IndexUnavailable`, never as an empty
/// result set.
pub trait VectorIndex: Send + Sync {
    /// Insert or replace all passages for a document.
    ///
    /// Atomic with respect to the document: concurrent searches see either
    /// the previous state or the full new state. Re-upserting the same
    /// document id replaces prior entries (idempotent overwrite). Every
    /// passage must carry an embedding whose dimensionality matches the
    /// index's declared dimensionality.
    fn upsert_document(&self, document: &Document, passages: &[Passage]) -> AppResult<()>;

    /// Search for the top-k most similar passages to the query vector.
    ///
    /// Results are ordered by descending similarity score, ties broken by
    /// passage identifier. Returns fewer than `top_k` results only when
    /// the index holds fewer eligible entries.
    fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> AppResult<Vec<ScoredPassage>>;

    /// Remove all passages for a document.
    ///
    /// Subsequent searches never return them.
    fn delete_document(&self, document_id: &str) -> AppResult<()>;

    /// Get statistics about the index.
    fn stats(&self) -> AppResult<IndexStats>;
}
