//! Retrieval over the vector index.
//!
//! Embeds the query, searches the index, applies the relevance threshold,
//! and collapses near-duplicate passages from overlapping chunk windows.

use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::types::{Passage, RetrievalOutcome, ScoredPassage, SearchFilter};
use pdfchat_core::{AppError, AppResult};
use std::sync::Arc;

/// Two same-document passages whose byte ranges overlap by at least this
/// fraction of the shorter range are treated as duplicates; the
/// higher-scoring one is kept.
const OVERLAP_DEDUP_FRACTION: f32 = 0.5;

/// Query-side retrieval front end.
pub struct Retriever {
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(
        embedder: Arc<Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k: top_k.max(1),
            min_score,
        }
    }

    /// Retrieve passages relevant to a query.
    ///
    /// Returns `NoRelevantContext` when threshold filtering leaves nothing,
    /// so callers can distinguish "nothing relevant" from an index error.
    pub async fn retrieve(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
    ) -> AppResult<RetrievalOutcome> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed_one(query).await?;
        let results = self.index.search(&query_vector, self.top_k, filter)?;

        tracing::debug!("Retrieved {} passages before filtering", results.len());

        let above_threshold: Vec<ScoredPassage> = results
            .into_iter()
            .filter(|r| r.score >= self.min_score)
            .collect();

        let deduped = dedup_overlapping(above_threshold);

        if deduped.is_empty() {
            tracing::info!(
                "No relevant passages (threshold {:.2})",
                self.min_score
            );
            return Ok(RetrievalOutcome::NoRelevantContext);
        }

        tracing::info!(
            "Retrieved {} relevant passages (top score: {:.3})",
            deduped.len(),
            deduped.first().map(|r| r.score).unwrap_or(0.0)
        );

        Ok(RetrievalOutcome::Relevant(deduped))
    }
}

/// Collapse same-document passages with heavily overlapping byte ranges.
///
/// Input is ordered by descending score, so a greedy keep-first pass
/// retains the higher-scoring member of each overlapping pair.
fn dedup_overlapping(results: Vec<ScoredPassage>) -> Vec<ScoredPassage> {
    let mut kept: Vec<ScoredPassage> = Vec::with_capacity(results.len());

    for candidate in results {
        let duplicate = kept.iter().any(|existing| {
            existing.passage.document_id == candidate.passage.document_id
                && overlap_fraction(&existing.passage, &candidate.passage)
                    >= OVERLAP_DEDUP_FRACTION
        });

        if !duplicate {
            kept.push(candidate);
        }
    }

    kept
}

/// Overlap of two byte ranges as a fraction of the shorter range.
fn overlap_fraction(a: &Passage, b: &Passage) -> f32 {
    let overlap = a.end.min(b.end).saturating_sub(a.start.max(b.start));
    let shorter = a.span_len().min(b.span_len()).max(1);
    overlap as f32 / shorter as f32
}
