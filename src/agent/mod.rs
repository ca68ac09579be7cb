//! Multi-agent research pipeline.
//!
//! A single-query workflow over a financial PDF: a deterministic local
//! classifier routes the query, a retriever agent extracts per-chunk
//! partial answers, the tool layer fetches external evidence when
//! needed, and a synthesizer merges the structured fact lists into an
//! answer the verifier then scores. Attribution is system-computed
//! throughout; the model never writes its own provenance.
//!
//! # Architecture
//!
//! ```text
//! (question, pdf) → Orchestrator
//!   ├── classify        fast local routing, no model calls
//!   ├── retrieve        per-chunk extractive partial answers
//!   ├── tools           planner → credential handshake → executor
//!   ├── completion      targeted lookup for missing slots
//!   ├── memory recall   prior Q&A for this document
//!   ├── synthesize      blocking or token-streamed
//!   ├── verify          confidence + quality flags
//!   └── persist         append Q&A to per-document memory
//! ```

pub mod classifier;
pub mod client;
pub mod config;
pub mod events;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reranker;
pub mod retriever;
pub mod slots;
pub mod synthesizer;
pub mod verifier;

// Re-export key types
pub use classifier::{Classification, classify};
pub use client::{LlmClient, join_stream_piece};
pub use config::QaConfig;
pub use events::{
    ExternalFact, InternalFact, MemoryFact, ProvenanceEntry, SourceKind, StreamEvent, TraceEvent,
    TraceStatus, WorkflowResult,
};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{Orchestrator, StreamOptions};
pub use provider::{CompletionStream, LlmProvider, create_provider};
pub use retriever::PartialAnswer;
pub use verifier::{SourceWeights, Verification, verify};
