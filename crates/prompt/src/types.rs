//! Prompt types for the pdfchat pipeline.
//!
//! This module defines the domain entities for prompt assembly.

use serde::{Deserialize, Serialize};

/// A retrieved passage prepared for prompt rendering.
///
/// `label` is the citation handle the model is allowed to reference
/// (e.g., "P1"); the composer guarantees labels map one-to-one onto
/// passages that actually entered the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPassage {
    /// Citation label (e.g., "P1")
    pub label: String,

    /// Human-readable source (filename)
    pub source: String,

    /// Passage text
    pub text: String,
}

/// A conversation turn prepared for prompt rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// "user" or "assistant"
    pub role: String,

    /// Turn text
    pub text: String,
}

/// The template pair a chat prompt is rendered from.
#[derive(Debug, Clone)]
pub struct ChatTemplate {
    /// Template identifier for logging
    pub id: String,

    /// System instruction for grounded answering
    pub system_grounded: String,

    /// System instruction when no relevant context survived retrieval
    pub system_history_only: String,

    /// Handlebars template for the user message
    pub user_template: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message
    pub system: String,

    /// User message
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source template ID
    pub template_id: String,

    /// Number of passages rendered into the prompt
    pub passages_included: usize,

    /// Number of history turns rendered into the prompt
    pub history_turns_included: usize,

    /// Whether the prompt was assembled in history-only mode
    pub history_only: bool,
}
