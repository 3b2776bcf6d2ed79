//! Pipeline type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An ingested document.
///
/// Immutable once stored; removed only by explicit deletion. The raw text
/// is what the external extraction step produced for the source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, derived from the source filename
    pub id: String,

    /// Source filename (e.g., "report.pdf")
    pub filename: String,

    /// Raw extracted text
    pub text: String,

    /// Ingestion timestamp
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Create a document for freshly extracted text.
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            id: Self::id_for(&filename),
            filename,
            text: text.into(),
            ingested_at: Utc::now(),
        }
    }

    /// Derive the stable document id for a filename.
    ///
    /// Deterministic so that re-ingesting the same source replaces its
    /// prior index entries instead of accumulating duplicates.
    pub fn id_for(filename: &str) -> String {
        let digest = Sha256::digest(filename.as_bytes());
        hex_prefix(&digest, 16)
    }
}

/// A bounded span of document text, the atomic retrievable unit.
///
/// Created by the chunker without a vector; the embedder attaches the
/// vector exactly once, and the passage is never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Identifier: document id + zero-padded sequence index
    pub id: String,

    /// Owning document id (back-reference)
    pub document_id: String,

    /// Sequence index within the document
    pub seq: u32,

    /// Text span
    pub text: String,

    /// Byte offset of the span start in the document text
    pub start: usize,

    /// Byte offset one past the span end
    pub end: usize,

    /// SHA-256 hash of the text span
    pub hash: String,

    /// Embedding vector; None until embedded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Passage {
    /// Create an unembedded passage.
    pub fn new(document_id: &str, seq: u32, text: String, start: usize, end: usize) -> Self {
        let hash = hex_prefix(&Sha256::digest(text.as_bytes()), 32);
        Self {
            id: Self::id_for(document_id, seq),
            document_id: document_id.to_string(),
            seq,
            text,
            start,
            end,
            hash,
            embedding: None,
        }
    }

    /// Passage identifier format shared with the index backend.
    pub fn id_for(document_id: &str, seq: u32) -> String {
        format!("{}:{:04}", document_id, seq)
    }

    /// Byte length of the span.
    pub fn span_len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

fn hex_prefix(digest: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out.truncate(chars);
    out
}

/// A passage returned from similarity search with its score and the
/// owning document's filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub filename: String,
    pub score: f32,
}

/// Outcome of a retrieval: either ranked relevant passages, or an explicit
/// signal that nothing cleared the relevance threshold.
///
/// The distinct variant lets the answer composer choose a different
/// behavior instead of treating "nothing relevant" as an ordinary empty
/// list.
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    /// Ranked, deduplicated passages above the relevance threshold
    Relevant(Vec<ScoredPassage>),

    /// Retrieval ran but nothing cleared the threshold
    NoRelevantContext,
}

impl RetrievalOutcome {
    /// Passages if any survived filtering.
    pub fn passages(&self) -> &[ScoredPassage] {
        match self {
            RetrievalOutcome::Relevant(passages) => passages,
            RetrievalOutcome::NoRelevantContext => &[],
        }
    }
}

/// Filter narrowing a similarity search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict results to a single document
    pub document_id: Option<String>,
}

/// A user-facing source reference for an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source filename
    pub source: String,

    /// Location within the source
    pub location: String,

    /// Short snippet showing the relevant evidence
    pub snippet: String,
}

/// Response from a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated answer text
    pub answer: String,

    /// Sources for the passages placed in the prompt
    pub sources: Vec<SourceRef>,

    /// Whether the answer was grounded in retrieved passages
    pub grounded: bool,
}

/// Report from a completed ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Document id assigned to the ingested source
    pub document_id: String,

    /// Source filename
    pub filename: String,

    /// Number of passages indexed
    pub passage_count: u32,

    /// Bytes of extracted text processed
    pub byte_count: u64,

    /// Wall-clock duration in seconds
    pub duration_secs: f64,
}

/// Statistics for a vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of documents
    pub documents: u32,

    /// Number of passages
    pub passages: u32,

    /// Declared vector dimensionality, if any entries exist
    pub dimension: Option<usize>,

    /// Database size in bytes
    pub db_size_bytes: u64,
}
