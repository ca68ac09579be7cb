//! CLI layer.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, streaming answers, and managing memory and tool
//! credentials. The CLI consumes the orchestrator's public entry
//! points; it is presentation only.

pub mod commands;
pub mod parser;

pub use commands::execute;
pub use parser::{Cli, Commands, MemoryCommands, ToolCommands};
