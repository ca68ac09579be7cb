//! The LLM provider seam.
//!
//! One query talks to exactly one remote chat service, and the
//! pipeline only ever needs two things from it: a full completion for
//! the classifier-adjacent agents and a token stream for synthesis.
//! The trait is kept that narrow on purpose. Multi-vendor dispatch is
//! not a goal here; OpenAI-compatible gateways, proxies, and local
//! servers are all reached through the base-URL override on the single
//! built-in transport, and evaluation harnesses substitute a scripted
//! implementation instead of a second vendor.
//!
//! Providers surface transport errors as-is. The pipeline's
//! degrade-to-empty policy lives in [`LlmClient`](super::client::LlmClient),
//! so "the call failed" and "treat it as absent text" are decided in
//! one place rather than inside each transport.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;

use super::config::QaConfig;
use super::message::{ChatRequest, ChatResponse};
use super::providers::OpenAiProvider;
use crate::error::QaError;

/// Incremental generation text from a streaming completion.
///
/// Pieces from this stream become the protocol's `token` events;
/// consumers reassemble them with
/// [`join_stream_piece`](super::client::join_stream_piece).
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, QaError>> + Send>>;

/// Transport behind the LLM agents.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Executes a completion request and returns the full generation.
    ///
    /// # Errors
    ///
    /// Returns [`QaError`] on API failures, timeouts, or parse errors.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, QaError>;

    /// Executes a completion request as a stream of incremental text
    /// pieces.
    ///
    /// The stream must perform no output side effects of its own, so
    /// interactive and evaluation consumers can drain it identically.
    ///
    /// # Errors
    ///
    /// Returns [`QaError`] on connection or streaming failures.
    async fn stream(&self, request: &ChatRequest) -> Result<CompletionStream, QaError>;
}

/// Creates the provider named in configuration.
///
/// Only the OpenAI-compatible transport is built in; point
/// `QA_BASE_URL` at a gateway or local server for anything that speaks
/// the same API.
///
/// # Errors
///
/// Returns [`QaError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &QaConfig) -> Result<Arc<dyn LlmProvider>, QaError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            &config.api_key,
            config.base_url.as_deref(),
        ))),
        other => Err(QaError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
