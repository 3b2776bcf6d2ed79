//! Chat command handler.
//!
//! Single-shot with `--query`, or an interactive loop holding one session
//! for the process lifetime. A failed turn is not recorded, so the user
//! can simply resubmit.

use clap::Args;
use pdfchat_core::{config::AppConfig, AppResult};
use pdfchat_rag::{ChatEngine, ChatResponse};
use std::io::{BufRead, Write};

/// Ask questions about ingested documents
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Single question (omit for an interactive session)
    #[arg(short, long)]
    pub query: Option<String>,

    /// Session identifier (default: fresh session per invocation)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Output responses as JSON
    #[arg(long)]
    pub json: bool,

    /// Hide source references
    #[arg(long)]
    pub no_sources: bool,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let engine = ChatEngine::from_config(config)?;
        let session_id = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        tracing::debug!("Chat session: {}", session_id);

        if let Some(ref query) = self.query {
            let response = engine.chat(&session_id, query).await?;
            self.print_response(&response)?;
            return Ok(());
        }

        self.run_interactive(&engine, &session_id).await
    }

    /// Interactive loop: one session until EOF or /quit.
    async fn run_interactive(&self, engine: &ChatEngine, session_id: &str) -> AppResult<()> {
        println!("pdfchat interactive session (Ctrl-D or /quit to exit, /reset to clear history)");

        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();

        loop {
            print!("> ");
            stdout.flush().ok();

            let mut line = String::new();
            let read = stdin.lock().read_line(&mut line)?;
            if read == 0 {
                break; // EOF
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input {
                "/quit" | "/exit" => break,
                "/reset" => {
                    engine.reset_session(session_id);
                    println!("Session history cleared.");
                    continue;
                }
                _ => {}
            }

            match engine.chat(session_id, input).await {
                Ok(response) => self.print_response(&response)?,
                Err(e) => {
                    // The turn was not recorded; resubmitting is safe
                    eprintln!("error: {} (the turn was not recorded, you may resubmit)", e);
                }
            }
        }

        Ok(())
    }

    /// Print a chat response in the selected format.
    fn print_response(&self, response: &ChatResponse) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(response)?);
            return Ok(());
        }

        println!("{}", response.answer);

        if !self.no_sources && !response.sources.is_empty() {
            println!();
            println!("Sources:");
            for source in &response.sources {
                println!("  - {} ({}): {}", source.source, source.location, source.snippet);
            }
        }

        Ok(())
    }
}
