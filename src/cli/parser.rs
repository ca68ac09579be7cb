//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BFSIQA: research assistant for financial PDF documents.
///
/// Ask questions against a PDF; answers come back with provenance and
/// a confidence score.
#[derive(Parser, Debug)]
#[command(name = "bfsiqa")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question against a PDF and print the full result.
    #[command(after_help = r#"Examples:
  bfsiqa ask report.pdf "What was total revenue in 2024?"
  ENABLE_TOOL_AGENT=1 bfsiqa ask report.pdf "Current market cap vs 2024 revenue?"
  bfsiqa ask report.pdf "Summarize capital ratios" --json
"#)]
    Ask {
        /// Path to the PDF document.
        pdf: PathBuf,

        /// The question to answer.
        question: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a question and stream tokens as they are generated.
    Stream {
        /// Path to the PDF document.
        pdf: PathBuf,

        /// The question to answer.
        question: String,
    },

    /// Warm the embedding cache for a document's chunks.
    ///
    /// Run once after adding a document so the first query does not pay
    /// the full embedding cost inside its latency budget.
    Precompute {
        /// Path to the PDF document.
        pdf: PathBuf,
    },

    /// Memory operations for stored Q&A records.
    #[command(subcommand)]
    Memory(MemoryCommands),

    /// External tool catalog and credential management.
    #[command(subcommand)]
    Tools(ToolCommands),
}

/// Memory subcommands.
#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// List all memory files.
    List,

    /// Show stored Q&A records for a PDF.
    Show {
        /// Path to the PDF document.
        pdf: PathBuf,
    },

    /// Delete the memory file for a PDF.
    Clear {
        /// Path to the PDF document.
        pdf: PathBuf,
    },
}

/// Tool subcommands.
#[derive(Subcommand, Debug)]
pub enum ToolCommands {
    /// List the conceptual tool catalog and configured providers.
    List,

    /// Store credentials for a configured provider.
    AddCredentials {
        /// Provider id (as in tool_config.json).
        provider: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["bfsiqa", "ask", "report.pdf", "what was revenue?"])
            .unwrap_or_else(|_| unreachable!());
        match cli.command {
            Commands::Ask { pdf, question, json } => {
                assert_eq!(pdf, PathBuf::from("report.pdf"));
                assert_eq!(question, "what was revenue?");
                assert!(!json);
            }
            _ => panic!("expected Ask"),
        }
    }

    #[test]
    fn test_parse_memory_clear() {
        let cli = Cli::try_parse_from(["bfsiqa", "memory", "clear", "report.pdf"])
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            cli.command,
            Commands::Memory(MemoryCommands::Clear { .. })
        ));
    }
}
