//! Template loader with workspace override support.
//!
//! The built-in templates cover grounded answering and the history-only
//! fallback. A workspace can replace the user template by placing a
//! Handlebars file at `.pdfchat/prompts/chat.hbs`.

use crate::types::ChatTemplate;
use pdfchat_core::{AppError, AppResult};
use std::path::Path;

/// System instruction for grounded answering.
const SYSTEM_GROUNDED: &str = "\
You are a document assistant answering questions about material the user has ingested.\n\
\n\
Instructions:\n\
- Ground your answer only in the supplied passages; do not draw on outside knowledge\n\
- You may cite a passage by its bracketed label (e.g., [P1]); never cite a label that was not supplied\n\
- If the passages suggest but do not confirm something, express that nuance clearly\n\
- If the passages do not contain the answer, say so plainly\n\
- Keep your response concise and factual\n";

/// System instruction when retrieval produced no relevant passages.
const SYSTEM_HISTORY_ONLY: &str = "\
You are a document assistant. No passage relevant to this question was found in the ingested material.\n\
\n\
Instructions:\n\
- Answer only if the prior conversation turns already contain the information\n\
- Otherwise state that the ingested material does not cover the question\n\
- Do not invent document content and do not cite any passage\n";

/// Built-in user message template.
const DEFAULT_USER_TEMPLATE: &str = "\
{{#if has_history}}Conversation so far:\n\
{{#each history}}{{this.role}}: {{this.text}}\n\
{{/each}}\n\
{{/if}}\
{{#if has_passages}}Passages from the ingested material:\n\
\n\
{{#each passages}}[{{this.label}}] (from {{this.source}})\n\
{{this.text}}\n\
\n\
---\n\
\n\
{{/each}}\
{{/if}}\
User question:\n\
{{question}}\n";

/// Load the chat template, preferring a workspace override.
///
/// Looks for `.pdfchat/prompts/chat.hbs` under `workspace_path`; when
/// absent the built-in template is used.
pub fn load_template(workspace_path: &Path) -> AppResult<ChatTemplate> {
    let override_path = workspace_path.join(".pdfchat/prompts/chat.hbs");

    let (id, user_template) = if override_path.exists() {
        let contents = std::fs::read_to_string(&override_path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read template override {:?}: {}",
                override_path, e
            ))
        })?;

        if contents.trim().is_empty() {
            return Err(AppError::Config(format!(
                "Template override {:?} is empty",
                override_path
            )));
        }

        tracing::info!("Using chat template override from {:?}", override_path);
        ("chat.workspace".to_string(), contents)
    } else {
        tracing::debug!("Using built-in chat template");
        ("chat.default".to_string(), DEFAULT_USER_TEMPLATE.to_string())
    };

    Ok(ChatTemplate {
        id,
        system_grounded: SYSTEM_GROUNDED.to_string(),
        system_history_only: SYSTEM_HISTORY_ONLY.to_string(),
        user_template,
    })
}
