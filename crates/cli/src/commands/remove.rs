//! Remove command handler.

use clap::Args;
use pdfchat_core::{config::AppConfig, AppError, AppResult};
use pdfchat_rag::ChatEngine;

/// Remove a document from the index
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Document id, or the original filename it was ingested under
    pub document: String,
}

impl RemoveCommand {
    /// Execute the remove command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing remove command");

        if self.document.trim().is_empty() {
            return Err(AppError::InvalidInput("document is empty".to_string()));
        }

        let engine = ChatEngine::from_config(config)?;

        // Accept either form: a filename maps deterministically to its id
        let document_id = if self.document.contains('.') {
            ChatEngine::document_id_for(&self.document)
        } else {
            self.document.clone()
        };

        engine.remove_document(&document_id)?;
        println!("Removed document {}", document_id);

        Ok(())
    }
}
