//! Retrieval-augmented document chat pipeline.
//!
//! Ingestion path: document text → chunker → embedder → vector index.
//! Query path: query + conversation state → retriever → answer composer →
//! response + updated conversation state.
//!
//! The `ChatEngine` wires the components together and exposes the
//! caller-facing surface: `ingest`, `chat`, `reset_session`,
//! `remove_document`, and `stats`.

pub mod chunker;
pub mod composer;
pub mod embeddings;
pub mod index;
pub mod retriever;
pub mod session;
pub mod sqlite_index;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use composer::{AnswerComposer, ComposedAnswer};
pub use embeddings::{create_provider, Embedder, EmbeddingProvider};
pub use index::VectorIndex;
pub use retriever::Retriever;
pub use session::{Role, SessionStore, Turn};
pub use sqlite_index::SqliteVectorIndex;
pub use types::{
    ChatResponse, Document, IndexStats, IngestReport, Passage, RetrievalOutcome, ScoredPassage,
    SearchFilter, SourceRef,
};

use pdfchat_core::{AppConfig, AppError, AppResult, PipelineConfig};
use pdfchat_llm::LlmClient;
use pdfchat_prompt::ChatTemplate;
use std::sync::Arc;
use std::time::Instant;

/// Maximum snippet length for answer source references.
const MAX_SNIPPET_LENGTH: usize = 150;

/// The document chat pipeline.
///
/// One engine serves many concurrent sessions; the vector index and the
/// session store are the only shared state, and both support concurrent
/// access. Each chat request runs its own short sequential chain.
pub struct ChatEngine {
    pipeline: PipelineConfig,
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    composer: AnswerComposer,
    sessions: Arc<SessionStore>,
}

impl ChatEngine {
    /// Assemble an engine from its components.
    pub fn new(
        pipeline: PipelineConfig,
        embedder: Arc<Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        model: String,
        template: ChatTemplate,
        sessions: Arc<SessionStore>,
    ) -> AppResult<Self> {
        pipeline.validate()?;

        let retriever = Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            pipeline.top_k,
            pipeline.min_score,
        );
        let composer = AnswerComposer::new(llm, template, model, pipeline.context_token_budget);

        Ok(Self {
            pipeline,
            embedder,
            index,
            retriever,
            composer,
            sessions,
        })
    }

    /// Build an engine from application configuration.
    ///
    /// Creates the embedding provider, SQLite index, LLM client, prompt
    /// template and session store the config describes.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        config.ensure_pdfchat_dir()?;

        let provider = embeddings::create_provider(
            &config.pipeline.embedding_provider,
            &config.pipeline.embedding_model,
            config.pipeline.embedding_dim,
            config.endpoint.as_deref(),
        )?;
        let embedder = Arc::new(Embedder::new(provider, config.pipeline.embed_batch_size));

        let index: Arc<dyn VectorIndex> =
            Arc::new(SqliteVectorIndex::new(&config.index_path())?);

        let llm = pdfchat_llm::create_client(
            &config.provider,
            config.endpoint.as_deref(),
            config.api_key.as_deref(),
        )?;

        let template = pdfchat_prompt::load_template(&config.workspace)?;
        let sessions = Arc::new(SessionStore::new(config.pipeline.max_turns));

        Self::new(
            config.pipeline.clone(),
            embedder,
            index,
            llm,
            config.model.clone(),
            template,
            sessions,
        )
    }

    /// Ingest one document of extracted text.
    ///
    /// All embedding batches must succeed before anything is written, and
    /// the index upsert is atomic, so a failure anywhere leaves no partial
    /// state. Re-ingesting the same filename replaces its prior entries.
    pub async fn ingest(&self, filename: &str, text: &str) -> AppResult<IngestReport> {
        let start = Instant::now();

        if filename.trim().is_empty() {
            return Err(AppError::InvalidInput("filename is empty".to_string()));
        }

        tracing::info!("Ingesting document '{}' ({} bytes)", filename, text.len());

        let document = Document::new(filename, text);
        let mut passages = chunker::chunk_document(
            &document.id,
            text,
            self.pipeline.chunk_size,
            self.pipeline.chunk_overlap,
        )?;

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        for (passage, vector) in passages.iter_mut().zip(vectors) {
            passage.embedding = Some(vector);
        }

        self.index.upsert_document(&document, &passages)?;

        let duration = start.elapsed();
        tracing::info!(
            "Ingested '{}' as document '{}': {} passages in {:.2}s",
            filename,
            document.id,
            passages.len(),
            duration.as_secs_f64()
        );

        Ok(IngestReport {
            document_id: document.id,
            filename: filename.to_string(),
            passage_count: passages.len() as u32,
            byte_count: text.len() as u64,
            duration_secs: duration.as_secs_f64(),
        })
    }

    /// Answer one chat turn for a session.
    ///
    /// Conversation state is updated only after generation succeeds: a
    /// failed turn is not recorded and the user may resubmit.
    pub async fn chat(&self, session_id: &str, query: &str) -> AppResult<ChatResponse> {
        if session_id.trim().is_empty() {
            return Err(AppError::InvalidInput("session id is empty".to_string()));
        }
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("query is empty".to_string()));
        }

        tracing::info!("Chat turn for session '{}'", session_id);

        let history = self
            .sessions
            .recent(session_id, self.pipeline.history_window);

        let retrieval = self.retriever.retrieve(query, None).await?;
        let composed = self.composer.answer(query, &retrieval, &history).await?;

        // Generation succeeded; only now does the session change
        self.sessions.append(session_id, Turn::user(query));
        self.sessions
            .append(session_id, Turn::assistant(composed.answer.clone()));

        let sources = composed.used_passages.iter().map(source_ref).collect();

        Ok(ChatResponse {
            answer: composed.answer,
            sources,
            grounded: composed.grounded,
        })
    }

    /// Drop all conversation state for a session.
    pub fn reset_session(&self, session_id: &str) {
        tracing::info!("Resetting session '{}'", session_id);
        self.sessions.reset(session_id);
    }

    /// Remove a document and all its passages from the index.
    pub fn remove_document(&self, document_id: &str) -> AppResult<()> {
        self.index.delete_document(document_id)
    }

    /// The document id a filename maps to.
    pub fn document_id_for(filename: &str) -> String {
        Document::id_for(filename)
    }

    /// Index statistics.
    pub fn stats(&self) -> AppResult<IndexStats> {
        self.index.stats()
    }

    /// The session store backing this engine.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Map a prompt passage to its user-facing source reference.
fn source_ref(scored: &ScoredPassage) -> SourceRef {
    SourceRef {
        source: scored.filename.clone(),
        location: format!("bytes {}-{}", scored.passage.start, scored.passage.end),
        snippet: truncate_snippet(&scored.passage.text, MAX_SNIPPET_LENGTH),
    }
}

/// Truncate a snippet at a word boundary.
fn truncate_snippet(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let mut cut = max_len;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let truncated = &text[..cut];

    if let Some(last_space) = truncated.rfind(char::is_whitespace) {
        format!("{}...", &truncated[..last_space])
    } else {
        format!("{}...", truncated)
    }
}
