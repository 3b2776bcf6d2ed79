//! Command handlers for the pdfchat CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod chat;
pub mod ingest;
pub mod remove;
pub mod stats;

// Re-export command types for convenience
pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use remove::RemoveCommand;
pub use stats::StatsCommand;
