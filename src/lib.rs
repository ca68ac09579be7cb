//! Retrieval-augmented question answering over financial PDF documents.
//!
//! Given a question and a PDF, the pipeline produces an answer grounded
//! in the document (and optionally in external web data), a
//! system-enforced provenance list attributing every piece of evidence
//! to a source, and a confidence score with quality flags.
//!
//! # Entry points
//!
//! [`Orchestrator::run`] returns the complete result; and
//! [`Orchestrator::run_stream`] yields the strictly ordered event
//! stream (`log`/`token`/`error` events, then exactly one `final`).
//!
//! ```no_run
//! use std::path::Path;
//! use bfsiqa::{Orchestrator, QaConfig};
//!
//! # async fn example() -> Result<(), bfsiqa::QaError> {
//! let orchestrator = Orchestrator::from_config(QaConfig::from_env()?)?;
//! let result = orchestrator
//!     .run("What was total revenue in 2024?", Path::new("report.pdf"))
//!     .await;
//! println!("{} (confidence {:.2})", result.answer, result.confidence);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod tools;

pub use agent::{
    LlmClient, LlmProvider, Orchestrator, QaConfig, StreamEvent, StreamOptions, WorkflowResult,
};
pub use error::QaError;
pub use memory::{MemoryEntry, MemoryStore};
