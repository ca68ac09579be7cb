//! CLI command execution.
//!
//! The CLI is a thin consumer of the orchestrator's two entry points;
//! it renders events and results but owns no pipeline logic.

use std::io::Write as _;
use std::sync::Arc;

use futures_util::StreamExt;

use super::parser::{Cli, Commands, MemoryCommands, ToolCommands};
use crate::agent::events::StreamEvent;
use crate::agent::retriever::precompute_embeddings;
use crate::agent::{Orchestrator, QaConfig, StreamOptions};
use crate::core::chunking::chunk_with_pages;
use crate::core::pdf;
use crate::embedding::RemoteEmbedder;
use crate::error::QaError;
use crate::memory::MemoryStore;
use crate::tools::registry::{
    CredentialPrompt, Credentials, ToolRegistry, parse_credential_payload,
};
use crate::tools::{ToolCategory, knowledge_base};

/// Confidence at or above which the band is "High".
const HIGH_CONFIDENCE: f32 = 0.8;
/// Confidence at or above which the band is "Medium".
const MEDIUM_CONFIDENCE: f32 = 0.5;

/// Executes the parsed CLI command.
///
/// # Errors
///
/// Returns [`QaError`] on configuration problems; query execution
/// itself never fails.
pub async fn execute(cli: Cli) -> Result<(), QaError> {
    match cli.command {
        Commands::Ask { pdf, question, json } => {
            let orchestrator = build_orchestrator()?;
            let result = orchestrator.run(&question, &pdf).await;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).unwrap_or_default()
                );
                return Ok(());
            }

            println!("\n=== ANSWER ===\n\n{}\n", result.answer);
            if !result.provenance.is_empty() {
                println!("Sources:");
                for p in &result.provenance {
                    println!("  [{}] {}", p.kind.as_str(), p.source);
                }
            }
            println!(
                "Confidence: {:.2} ({})",
                result.confidence,
                confidence_band(result.confidence)
            );
            if !result.flags.is_empty() {
                println!("Flags: {}", result.flags.join(", "));
            }
            Ok(())
        }

        Commands::Stream { pdf, question } => {
            let orchestrator = build_orchestrator()?;
            let mut events = orchestrator.run_stream(&question, &pdf, StreamOptions::default());

            while let Some(event) = events.next().await {
                match event {
                    StreamEvent::Log { message } => eprintln!("[{message}]"),
                    StreamEvent::Token { text } => {
                        print!("{text}");
                        let _ = std::io::stdout().flush();
                    }
                    StreamEvent::Error { message } => eprintln!("\n[error] {message}"),
                    StreamEvent::Final {
                        confidence, flags, provenance, ..
                    } => {
                        println!("\n");
                        for p in &provenance {
                            println!("  source: {}", p.source);
                        }
                        println!(
                            "Confidence: {confidence:.2} ({})",
                            confidence_band(confidence)
                        );
                        if !flags.is_empty() {
                            println!("Flags: {}", flags.join(", "));
                        }
                    }
                }
            }
            Ok(())
        }

        Commands::Precompute { pdf } => {
            let config = QaConfig::from_env()?;
            let embedder = RemoteEmbedder::new(
                &config.api_key,
                config.base_url.as_deref(),
                config.embedding_model_id.clone(),
            );
            let pages = pdf::extract_pages(&pdf, config.max_pages)?;
            let chunks =
                chunk_with_pages(&pages, config.chunk_size, config.chunk_overlap, config.max_chunks);
            let warmed = precompute_embeddings(&embedder, &chunks).await;
            println!("Embedded {warmed} of {} chunk(s).", chunks.len());
            Ok(())
        }

        Commands::Memory(cmd) => run_memory(cmd),
        Commands::Tools(cmd) => run_tools(cmd),
    }
}

fn build_orchestrator() -> Result<Orchestrator, QaError> {
    let config = QaConfig::from_env()?;
    Orchestrator::from_config_with_prompt(config, Arc::new(StdinPrompt))
}

fn run_memory(cmd: MemoryCommands) -> Result<(), QaError> {
    let config = QaConfig::builder().api_key("unused").from_env().build()?;
    let store = MemoryStore::new(config.memory_dir);

    match cmd {
        MemoryCommands::List => {
            let files = store.list_all();
            if files.is_empty() {
                println!("No memory files.");
            }
            for f in files {
                println!("{}", f.display());
            }
        }
        MemoryCommands::Show { pdf } => {
            let entries = store.load(&pdf);
            if entries.is_empty() {
                println!("No stored Q&As for {}.", pdf.display());
            }
            for e in entries {
                println!("Q: {}", e.question);
                println!("A: {}", e.answer);
                println!("   confidence {:.2}, {} source(s)\n", e.confidence, e.provenance.len());
            }
        }
        MemoryCommands::Clear { pdf } => {
            store.clear(&pdf)?;
            println!("Memory cleared for {}.", pdf.display());
        }
    }
    Ok(())
}

fn run_tools(cmd: ToolCommands) -> Result<(), QaError> {
    let config = QaConfig::builder().api_key("unused").from_env().build()?;
    let registry = ToolRegistry::load(&config.tool_config_path, &config.credentials_path);

    match cmd {
        ToolCommands::List => {
            println!("Conceptual tools:");
            for tool in knowledge_base() {
                println!(
                    "  {} [{}]: {} (e.g. {})",
                    tool.key,
                    tool.category,
                    tool.purpose,
                    tool.example_providers.join(", ")
                );
            }
            println!("\nConfigured providers:");
            let ids = registry.provider_ids();
            if ids.is_empty() {
                println!("  (none)");
            }
            for id in ids {
                if let Some(p) = registry.get(id) {
                    println!("  {id} [{}]", p.category);
                }
            }
        }
        ToolCommands::AddCredentials { provider } => {
            let required = registry
                .get(&provider)
                .map(|p| p.required_fields.clone())
                .unwrap_or_default();
            let prompt = StdinPrompt;
            match prompt.request(&provider, ToolCategory::Generic, &required) {
                Some(creds) => {
                    registry.register_credentials(&provider, creds)?;
                    println!("Credentials stored for '{provider}'.");
                }
                None => println!("Skipped."),
            }
        }
    }
    Ok(())
}

fn confidence_band(confidence: f32) -> &'static str {
    if confidence > HIGH_CONFIDENCE {
        "High"
    } else if confidence >= MEDIUM_CONFIDENCE {
        "Medium"
    } else {
        "Low"
    }
}

/// Interactive credential prompt over stdin.
///
/// Accepts a JSON object or comma-separated `key=value` pairs; the
/// literal `SKIP` declines the provider.
#[derive(Debug, Clone, Copy)]
pub struct StdinPrompt;

impl CredentialPrompt for StdinPrompt {
    fn request(
        &self,
        provider_id: &str,
        category: ToolCategory,
        required_fields: &[String],
    ) -> Option<Credentials> {
        eprintln!("External tool '{provider_id}' is recommended for category '{category}'.");
        eprintln!("Required fields: {required_fields:?}");
        eprintln!("Provide as JSON e.g. {{\"api_key\": \"xxx\"}} or key=value, or type SKIP.");
        eprint!("> ");

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return None;
        }
        parse_credential_payload(&line, required_fields)
    }
}
