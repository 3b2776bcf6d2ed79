//! Stats command handler.

use clap::Args;
use pdfchat_core::{config::AppConfig, AppResult};
use pdfchat_rag::ChatEngine;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    /// Execute the stats command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let engine = ChatEngine::from_config(config)?;
        let stats = engine.stats()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Documents:  {}", stats.documents);
        println!("Passages:   {}", stats.passages);
        match stats.dimension {
            Some(dim) => println!("Dimension:  {}", dim),
            None => println!("Dimension:  (empty index)"),
        }
        println!("Index size: {} bytes", stats.db_size_bytes);

        Ok(())
    }
}
