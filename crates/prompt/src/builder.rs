//! Prompt builder for rendering the chat template.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, ChatTemplate, ContextPassage, HistoryTurn};
use handlebars::Handlebars;
use pdfchat_core::{AppError, AppResult};
use serde::Serialize;

/// Variables handed to the Handlebars template.
#[derive(Serialize)]
struct RenderContext<'a> {
    question: &'a str,
    passages: &'a [ContextPassage],
    history: &'a [HistoryTurn],
    has_passages: bool,
    has_history: bool,
}

/// Build a chat prompt from the template, retrieved passages, and history.
///
/// When `history_only` is set the grounded system instruction is swapped
/// for the no-relevant-context variant; `passages` must be empty in that
/// mode, so the model cannot be induced to cite passages it never saw.
///
/// # Example
/// ```
/// use pdfchat_prompt::{build_chat_prompt, load_template, ContextPassage, HistoryTurn};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let template = load_template(std::path::Path::new("."))?;
/// let passages = vec![ContextPassage {
///     label: "P1".to_string(),
///     source: "report.pdf".to_string(),
///     text: "Revenue grew 12% in Q3.".to_string(),
/// }];
/// let built = build_chat_prompt(&template, "How did revenue change?", &passages, &[], false)?;
/// assert!(built.user.contains("[P1]"));
/// # Ok(())
/// # }
/// ```
pub fn build_chat_prompt(
    template: &ChatTemplate,
    question: &str,
    passages: &[ContextPassage],
    history: &[HistoryTurn],
    history_only: bool,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        "Building chat prompt '{}' ({} passages, {} history turns, history_only: {})",
        template.id,
        passages.len(),
        history.len(),
        history_only
    );

    if history_only && !passages.is_empty() {
        return Err(AppError::InvalidInput(
            "history-only prompt must not carry passages".to_string(),
        ));
    }

    let context = RenderContext {
        question,
        passages,
        history,
        has_passages: !passages.is_empty(),
        has_history: !history.is_empty(),
    };

    let user = render_template(&template.user_template, &context)?;

    let system = if history_only {
        template.system_history_only.clone()
    } else {
        template.system_grounded.clone()
    };

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            template_id: template.id.clone(),
            passages_included: passages.len(),
            history_turns_included: history.len(),
            history_only,
        },
    })
}

/// Render a Handlebars template with the given context.
fn render_template(template: &str, context: &RenderContext<'_>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain-text prompt, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("chat", template)
        .map_err(|e| AppError::Config(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("chat", context)
        .map_err(|e| AppError::Config(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
