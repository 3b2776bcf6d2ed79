//! Ingest command handler.
//!
//! Feeds extracted document text into the pipeline. PDF text extraction
//! happens outside the tool; this command accepts UTF-8 text files or
//! stdin.

use clap::Args;
use pdfchat_core::{config::AppConfig, AppError, AppResult};
use pdfchat_rag::ChatEngine;
use std::io::Read;
use std::path::PathBuf;

/// Ingest extracted document text into the index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Text files to ingest (UTF-8 extracted document text)
    pub files: Vec<PathBuf>,

    /// Read document text from stdin instead of files
    #[arg(long, conflicts_with = "files")]
    pub stdin: bool,

    /// Document name when reading from stdin (e.g., "report.pdf")
    #[arg(long, requires = "stdin")]
    pub name: Option<String>,

    /// Output reports as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    /// Execute the ingest command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        if !self.stdin && self.files.is_empty() {
            return Err(AppError::InvalidInput(
                "no input: pass text files or --stdin".to_string(),
            ));
        }

        let engine = ChatEngine::from_config(config)?;
        let mut reports = Vec::new();

        if self.stdin {
            let name = self.name.clone().ok_or_else(|| {
                AppError::InvalidInput("--stdin requires --name".to_string())
            })?;

            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(AppError::Io)?;

            reports.push(engine.ingest(&name, &text).await?);
        } else {
            for path in &self.files {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read {:?}: {}", path, e))
                })?;

                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string_lossy().to_string());

                match engine.ingest(&filename, &text).await {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        // Ingestion is atomic per document: nothing from
                        // this file was stored
                        eprintln!("error: ingesting {:?} failed ({}); no partial state was stored", path, e);
                        return Err(e);
                    }
                }
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            for report in &reports {
                println!(
                    "Ingested {} as {} ({} passages, {} bytes, {:.2}s)",
                    report.filename,
                    report.document_id,
                    report.passage_count,
                    report.byte_count,
                    report.duration_secs
                );
            }
        }

        Ok(())
    }
}
