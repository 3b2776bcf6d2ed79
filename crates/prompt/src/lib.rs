//! Prompt assembly crate for the pdfchat pipeline.
//!
//! Renders the grounded-answer prompt from retrieved passages and
//! conversation history using Handlebars templates. A workspace may
//! override the built-in user template with `.pdfchat/prompts/chat.hbs`.

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::build_chat_prompt;
pub use loader::load_template;
pub use types::{BuiltPrompt, BuiltPromptMetadata, ChatTemplate, ContextPassage, HistoryTurn};
