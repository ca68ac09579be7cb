//! Synthesizer agent: merges structured fact lists into a final answer.
//!
//! Blocking and streaming entry points share one prompt builder. The
//! model is instructed never to emit provenance labels; any that slip
//! through are stripped so attribution stays system-computed.

use std::pin::Pin;

use futures_util::Stream;

use super::client::LlmClient;
use super::events::{ExternalFact, InternalFact, MemoryFact};
use super::prompt::{SYNTHESIZER_SYSTEM_PROMPT, build_synthesis_prompt};

/// Synthesizes a blocking answer from the three fact lists.
///
/// Returns only the answer text; an unreachable model yields an empty
/// string for the orchestrator to handle.
pub async fn synthesize(
    llm: &LlmClient,
    internal_facts: &[InternalFact],
    external_facts: &[ExternalFact],
    memory_facts: &[MemoryFact],
    question: &str,
    variation: Option<&str>,
) -> String {
    let prompt =
        build_synthesis_prompt(internal_facts, external_facts, memory_facts, question, variation);
    let answer = llm
        .generate_with(Some(SYNTHESIZER_SYSTEM_PROMPT), &prompt, false)
        .await;
    strip_provenance_labels(&answer)
}

/// Streaming synthesis. Yields raw text pieces; the consumer joins them
/// with [`join_stream_piece`](super::client::join_stream_piece) and
/// strips labels from the accumulated answer.
pub async fn synthesize_stream(
    llm: &LlmClient,
    internal_facts: &[InternalFact],
    external_facts: &[ExternalFact],
    memory_facts: &[MemoryFact],
    question: &str,
) -> Pin<Box<dyn Stream<Item = String> + Send>> {
    let prompt =
        build_synthesis_prompt(internal_facts, external_facts, memory_facts, question, None);
    llm.stream(Some(SYNTHESIZER_SYSTEM_PROMPT), &prompt).await
}

/// Removes provenance labels a model may have emitted despite the
/// instruction not to.
#[must_use]
pub fn strip_provenance_labels(answer: &str) -> String {
    answer
        .replace("[INTERNAL]", "")
        .replace("[EXTERNAL]", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
