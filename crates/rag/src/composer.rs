//! Answer composition and generation.
//!
//! Assembles the grounded prompt from retrieved passages and recent
//! conversation turns, then makes exactly one generation call per turn.
//! Only rate-limit faults are retried here; a timeout or content filter
//! fails the turn. The composer reports which passages actually entered
//! the prompt, so citations can never point at passages the model was not
//! shown.

use crate::session::Turn;
use crate::types::{RetrievalOutcome, ScoredPassage};
use pdfchat_core::{AppError, AppResult, ProviderFault};
use pdfchat_llm::{LlmClient, LlmRequest};
use pdfchat_prompt::{build_chat_prompt, BuiltPrompt, ChatTemplate, ContextPassage, HistoryTurn};
use std::sync::Arc;
use std::time::Duration;

/// Extra generation attempts after a rate-limit fault
const GENERATION_RETRIES: u32 = 2;

/// Initial backoff after a rate-limit fault in milliseconds
const GENERATION_BACKOFF_MS: u64 = 500;

/// Rough prompt-budget accounting: 4 bytes per token
const BYTES_PER_TOKEN: usize = 4;

/// Sampling temperature for factual answering
const ANSWER_TEMPERATURE: f32 = 0.3;

/// Cap on generated answer length
const ANSWER_MAX_TOKENS: u32 = 1000;

/// Fixed answer when nothing relevant was retrieved and there is no
/// history to fall back on.
const NO_CONTEXT_ANSWER: &str =
    "I could not find anything about that in the ingested documents.";

/// A generated answer plus the passages that were actually in the prompt.
#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    pub answer: String,
    pub used_passages: Vec<ScoredPassage>,
    pub grounded: bool,
}

/// Prompt assembly and generation front end.
pub struct AnswerComposer {
    client: Arc<dyn LlmClient>,
    template: ChatTemplate,
    model: String,
    context_token_budget: usize,
}

impl AnswerComposer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        template: ChatTemplate,
        model: String,
        context_token_budget: usize,
    ) -> Self {
        Self {
            client,
            template,
            model,
            context_token_budget,
        }
    }

    /// Compose and generate an answer for one chat turn.
    ///
    /// The caller owns conversation state; this method never mutates it,
    /// so a `GenerationFailed` error leaves the session exactly as it was.
    pub async fn answer(
        &self,
        query: &str,
        retrieval: &RetrievalOutcome,
        history: &[Turn],
    ) -> AppResult<ComposedAnswer> {
        let history_turns: Vec<HistoryTurn> = history
            .iter()
            .map(|turn| HistoryTurn {
                role: turn.role.as_str().to_string(),
                text: turn.text.clone(),
            })
            .collect();

        match retrieval {
            RetrievalOutcome::Relevant(passages) => {
                let selected = select_within_budget(passages, self.context_token_budget);

                let context: Vec<ContextPassage> = selected
                    .iter()
                    .enumerate()
                    .map(|(i, scored)| ContextPassage {
                        label: format!("P{}", i + 1),
                        source: scored.filename.clone(),
                        text: scored.passage.text.clone(),
                    })
                    .collect();

                tracing::debug!(
                    "Composing grounded answer ({} of {} passages within budget)",
                    selected.len(),
                    passages.len()
                );

                let built =
                    build_chat_prompt(&self.template, query, &context, &history_turns, false)?;
                let answer = self.generate(&built).await?;

                Ok(ComposedAnswer {
                    answer,
                    used_passages: selected,
                    grounded: true,
                })
            }

            RetrievalOutcome::NoRelevantContext => {
                if history_turns.is_empty() {
                    // Nothing to ground on and no conversation to draw
                    // from: decline without a model call
                    tracing::info!("No relevant context and no history; declining turn");
                    return Ok(ComposedAnswer {
                        answer: NO_CONTEXT_ANSWER.to_string(),
                        used_passages: Vec::new(),
                        grounded: false,
                    });
                }

                tracing::info!("No relevant context; answering from history only");
                let built = build_chat_prompt(&self.template, query, &[], &history_turns, true)?;
                let answer = self.generate(&built).await?;

                Ok(ComposedAnswer {
                    answer,
                    used_passages: Vec::new(),
                    grounded: false,
                })
            }
        }
    }

    /// One generation call, retrying only rate-limit faults.
    async fn generate(&self, built: &BuiltPrompt) -> AppResult<String> {
        let request = LlmRequest::new(built.user.clone(), self.model.clone())
            .with_system(built.system.clone())
            .with_temperature(ANSWER_TEMPERATURE)
            .with_max_tokens(ANSWER_MAX_TOKENS);

        let mut attempt = 0u32;

        loop {
            match self.client.complete(&request).await {
                Ok(response) => return Ok(response.content),
                Err(e) if e.kind == ProviderFault::RateLimited && attempt < GENERATION_RETRIES => {
                    attempt += 1;
                    let backoff_ms = GENERATION_BACKOFF_MS * 2_u64.pow(attempt - 1);
                    tracing::warn!(
                        "Generation rate limited (attempt {}/{}), retrying in {}ms",
                        attempt,
                        GENERATION_RETRIES,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    tracing::error!("Generation failed: {}", e);
                    return Err(AppError::GenerationFailed(e.to_string()));
                }
            }
        }
    }
}

/// Select score-ordered passages whole until the token budget is hit.
///
/// The top passage is always included so the model is never left without
/// its best evidence.
fn select_within_budget(passages: &[ScoredPassage], budget_tokens: usize) -> Vec<ScoredPassage> {
    let mut selected = Vec::new();
    let mut used_tokens = 0usize;

    for (i, scored) in passages.iter().enumerate() {
        let cost = approx_tokens(&scored.passage.text);
        if i > 0 && used_tokens + cost > budget_tokens {
            break;
        }
        used_tokens += cost;
        selected.push(scored.clone());
    }

    selected
}

/// Byte-length token approximation.
fn approx_tokens(text: &str) -> usize {
    text.len().div_ceil(BYTES_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Passage;
    use pdfchat_core::ProviderError;
    use pdfchat_llm::{LlmResponse, LlmUsage};
    use pdfchat_prompt::load_template;
    use std::sync::Mutex;

    /// Scripted LLM: fails with the given faults in order, then succeeds.
    /// Captures every request it receives.
    struct ScriptedLlm {
        faults: Mutex<Vec<ProviderFault>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedLlm {
        fn new(faults: Vec<ProviderFault>) -> Self {
            Self {
                faults: Mutex::new(faults),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_request(&self) -> Option<LlmRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());

            let mut faults = self.faults.lock().unwrap();
            if !faults.is_empty() {
                let fault = faults.remove(0);
                return Err(ProviderError::new(fault, "scripted fault"));
            }

            Ok(LlmResponse {
                content: "scripted answer".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    fn scored(seq: u32, text: &str, score: f32) -> ScoredPassage {
        let start = seq as usize * 1000;
        let mut passage = Passage::new("doc1", seq, text.to_string(), start, start + text.len());
        passage.embedding = Some(vec![1.0]);
        ScoredPassage {
            passage,
            filename: "handbook.pdf".to_string(),
            score,
        }
    }

    fn composer(llm: Arc<ScriptedLlm>, budget: usize) -> AnswerComposer {
        let template = load_template(std::path::Path::new("/nonexistent")).unwrap();
        AnswerComposer::new(llm, template, "test-model".to_string(), budget)
    }

    #[tokio::test]
    async fn test_grounded_answer_includes_passages() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let composer = composer(Arc::clone(&llm), 2048);

        let retrieval = RetrievalOutcome::Relevant(vec![
            scored(0, "Vacation policy grants 25 days.", 0.9),
            scored(1, "Sick leave is unlimited.", 0.7),
        ]);

        let result = composer.answer("How many vacation days?", &retrieval, &[]).await.unwrap();

        assert_eq!(result.answer, "scripted answer");
        assert!(result.grounded);
        assert_eq!(result.used_passages.len(), 2);

        let request = llm.last_request().unwrap();
        assert!(request.prompt.contains("[P1]"));
        assert!(request.prompt.contains("[P2]"));
        assert!(request.prompt.contains("Vacation policy grants 25 days."));
        assert!(request.system.unwrap().contains("supplied passages"));
    }

    #[tokio::test]
    async fn test_budget_drops_whole_passages() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        // ~25 tokens per passage at 100 bytes each; budget fits two
        let composer = composer(Arc::clone(&llm), 50);

        let retrieval = RetrievalOutcome::Relevant(vec![
            scored(0, &"a".repeat(100), 0.9),
            scored(1, &"b".repeat(100), 0.8),
            scored(2, &"c".repeat(100), 0.7),
        ]);

        let result = composer.answer("question", &retrieval, &[]).await.unwrap();

        assert_eq!(result.used_passages.len(), 2);
        let request = llm.last_request().unwrap();
        assert!(request.prompt.contains("[P2]"));
        assert!(!request.prompt.contains("[P3]"));
    }

    #[tokio::test]
    async fn test_top_passage_survives_tiny_budget() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let composer = composer(Arc::clone(&llm), 1);

        let retrieval = RetrievalOutcome::Relevant(vec![scored(0, &"a".repeat(400), 0.9)]);
        let result = composer.answer("question", &retrieval, &[]).await.unwrap();
        assert_eq!(result.used_passages.len(), 1);
    }

    #[tokio::test]
    async fn test_no_context_without_history_skips_model() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let composer = composer(Arc::clone(&llm), 2048);

        let result = composer
            .answer("off-topic", &RetrievalOutcome::NoRelevantContext, &[])
            .await
            .unwrap();

        assert!(!result.grounded);
        assert!(result.used_passages.is_empty());
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_context_with_history_uses_history_only_prompt() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let composer = composer(Arc::clone(&llm), 2048);

        let history = vec![Turn::user("earlier question"), Turn::assistant("earlier answer")];
        let result = composer
            .answer("follow-up", &RetrievalOutcome::NoRelevantContext, &history)
            .await
            .unwrap();

        assert!(!result.grounded);
        assert_eq!(result.answer, "scripted answer");
        assert_eq!(llm.call_count(), 1);

        let request = llm.last_request().unwrap();
        assert!(request.system.unwrap().contains("No passage relevant"));
        assert!(request.prompt.contains("earlier question"));
    }

    #[tokio::test]
    async fn test_rate_limit_retried() {
        let llm = Arc::new(ScriptedLlm::new(vec![ProviderFault::RateLimited]));
        let composer = composer(Arc::clone(&llm), 2048);

        let retrieval = RetrievalOutcome::Relevant(vec![scored(0, "content", 0.9)]);
        let result = composer.answer("question", &retrieval, &[]).await.unwrap();

        assert_eq!(result.answer, "scripted answer");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_fails_turn_without_retry() {
        let llm = Arc::new(ScriptedLlm::new(vec![ProviderFault::Timeout]));
        let composer = composer(Arc::clone(&llm), 2048);

        let retrieval = RetrievalOutcome::Relevant(vec![scored(0, "content", 0.9)]);
        let err = composer.answer("question", &retrieval, &[]).await.unwrap_err();

        assert!(matches!(err, AppError::GenerationFailed(_)));
        assert_eq!(llm.call_count(), 1);
    }

    #[test]
    fn test_approx_tokens() {
        assert_eq!(approx_tokens(""), 0);
        assert_eq!(approx_tokens("abcd"), 1);
        assert_eq!(approx_tokens("abcde"), 2);
    }
}
