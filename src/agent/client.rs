//! Degrading LLM client.
//!
//! [`LlmClient`] wraps an [`LlmProvider`] with the pipeline's failure
//! policy: a failed blocking call returns an empty string and a failed
//! stream simply ends. Stages never see transport errors; they see
//! absent text and degrade. Failures are logged via `tracing`.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};

use super::message::{ChatRequest, system_message, user_message};
use super::provider::LlmProvider;

/// Default maximum generation length for agent calls.
const DEFAULT_MAX_TOKENS: u32 = 800;

/// LLM client with never-fails semantics.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
}

impl LlmClient {
    /// Creates a client over the given provider and model.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    /// Model id this client generates with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, system: Option<&str>, prompt: &str, json_mode: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(system_message(sys));
        }
        messages.push(user_message(prompt));
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            json_mode,
            stream: false,
        }
    }

    /// Blocking generation. Returns the generated text, or an empty
    /// string on any failure. Never returns an error.
    pub async fn generate(&self, prompt: &str) -> String {
        self.generate_with(None, prompt, false).await
    }

    /// Blocking generation with an optional system instruction and JSON
    /// output mode. Empty string on failure.
    pub async fn generate_with(
        &self,
        system: Option<&str>,
        prompt: &str,
        json_mode: bool,
    ) -> String {
        let request = self.request(system, prompt, json_mode);
        match self.provider.complete(&request).await {
            Ok(response) => response.content,
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "LLM call failed");
                String::new()
            }
        }
    }

    /// Streaming generation. Yields incremental text pieces; a transport
    /// failure ends the stream instead of surfacing an error. The stream
    /// performs no printing of its own.
    pub async fn stream(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        let mut request = self.request(system, prompt, false);
        request.stream = true;

        match self.provider.stream(&request).await {
            Ok(inner) => {
                let model = self.model.clone();
                Box::pin(inner.filter_map(move |piece| {
                    let model = model.clone();
                    async move {
                        match piece {
                            Ok(text) if text.is_empty() => None,
                            Ok(text) => Some(text),
                            Err(e) => {
                                tracing::warn!(model = %model, error = %e, "stream piece failed");
                                None
                            }
                        }
                    }
                }))
            }
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "stream open failed");
                Box::pin(futures_util::stream::empty())
            }
        }
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Punctuation that attaches to the preceding word without a space.
const ATTACHING_PUNCT: &[char] = &['.', ',', '!', '?', ';', ':', ')', '"', '\''];

/// Appends a streamed text piece to accumulated text, restoring word
/// boundaries the token stream may have dropped.
///
/// A single space is inserted between two non-whitespace pieces only
/// when the incoming piece begins with an uppercase letter (a new word)
/// or the accumulated text ends with sentence punctuation. This keeps
/// run-together tokens apart without splitting subwords or acronyms.
pub fn join_stream_piece(accumulated: &mut String, piece: &str) {
    if piece.is_empty() {
        return;
    }
    if accumulated.is_empty() {
        accumulated.push_str(piece);
        return;
    }

    let last = accumulated.chars().next_back().unwrap_or(' ');
    let first = piece.chars().next().unwrap_or(' ');

    let need_space = !last.is_whitespace()
        && !first.is_whitespace()
        && !ATTACHING_PUNCT.contains(&first)
        && (first.is_uppercase() || matches!(last, '.' | '!' | '?'));

    if need_space {
        accumulated.push(' ');
    }
    accumulated.push_str(piece);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_separates_new_sentences() {
        let mut acc = String::from("NOT");
        join_stream_piece(&mut acc, "RELEVANT");
        assert_eq!(acc, "NOT RELEVANT");
    }

    #[test]
    fn test_join_keeps_subwords_together() {
        let mut acc = String::from("inv");
        join_stream_piece(&mut acc, "igorate");
        assert_eq!(acc, "invigorate");
    }

    #[test]
    fn test_join_after_sentence_punctuation() {
        let mut acc = String::from("Revenue grew.");
        join_stream_piece(&mut acc, "profit");
        assert_eq!(acc, "Revenue grew. profit");
    }

    #[test]
    fn test_join_empty_pieces() {
        let mut acc = String::new();
        join_stream_piece(&mut acc, "");
        assert!(acc.is_empty());
        join_stream_piece(&mut acc, "start");
        assert_eq!(acc, "start");
    }

    #[test]
    fn test_join_existing_whitespace_untouched() {
        let mut acc = String::from("total ");
        join_stream_piece(&mut acc, "Revenue");
        assert_eq!(acc, "total Revenue");
    }

    #[test]
    fn test_join_punctuation_attaches() {
        let mut acc = String::from("billion");
        join_stream_piece(&mut acc, ".");
        assert_eq!(acc, "billion.");
    }
}
