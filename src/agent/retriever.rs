//! Retriever agent: per-chunk extractive partial answers.
//!
//! Ranks chunks by embedding similarity (token-overlap fallback) and
//! asks the model for a short extractive answer per relevant chunk. An
//! empty model response falls back to the chunk text itself so the
//! synthesizer always sees some evidence for a retrieved chunk.

use crate::agent::client::LlmClient;
use crate::agent::prompt::{NOT_RELEVANT, build_chunk_prompt};
use crate::core::chunking::Chunk;
use crate::core::relevance::embedding_top_k;
use crate::embedding::Embedder;

/// Hard cap on chunks sent to the model per query.
const MAX_PARTIALS: usize = 15;
/// Characters of chunk text used when the model returns nothing.
const FALLBACK_TEXT_LEN: usize = 500;

/// One chunk's contribution of evidence toward the answer.
#[derive(Debug, Clone)]
pub struct PartialAnswer {
    /// Short model-generated answer for this chunk, or truncated chunk
    /// text when generation produced nothing.
    pub text: String,
    /// Full chunk text the answer was conditioned on.
    pub chunk_text: String,
    /// 1-based page, when known.
    pub page: Option<u32>,
    /// Retrieval similarity in `[0, 1]`.
    pub similarity: f32,
}

/// Produces partial answers for the chunks most relevant to the query.
///
/// `top_k` is clamped to [`MAX_PARTIALS`]. Chunks whose extraction call
/// returns the not-relevant sentinel are dropped.
pub async fn retrieve(
    llm: &LlmClient,
    embedder: &dyn Embedder,
    query: &str,
    chunks: &[Chunk],
    top_k: usize,
) -> Vec<PartialAnswer> {
    let top_k = top_k.min(MAX_PARTIALS);
    let scored = embedding_top_k(embedder, query, chunks, top_k, 0.0).await;
    let total = scored.len();

    let mut partials = Vec::with_capacity(total);
    for (i, hit) in scored.iter().enumerate() {
        let prompt = build_chunk_prompt(&hit.chunk_text, query, i + 1, total);
        let response = llm.generate(&prompt).await;
        let response = response.trim();

        if response.to_uppercase().starts_with(NOT_RELEVANT) {
            continue;
        }

        let text = if response.is_empty() {
            hit.chunk_text.chars().take(FALLBACK_TEXT_LEN).collect()
        } else {
            response.to_string()
        };

        partials.push(PartialAnswer {
            text,
            chunk_text: hit.chunk_text.clone(),
            page: hit.page,
            similarity: hit.similarity,
        });
    }

    tracing::debug!(partials = partials.len(), scored = total, "retriever done");
    partials
}

/// Warms the embedder's cache for a document's chunks, so the first
/// query against a freshly uploaded document does not pay the full
/// embedding cost inside its latency budget.
pub async fn precompute_embeddings(embedder: &dyn Embedder, chunks: &[Chunk]) -> usize {
    let mut warmed = 0;
    for chunk in chunks.iter().take(MAX_PARTIALS) {
        let head: String = chunk.text.chars().take(2000).collect();
        if embedder.embed(&head).await.is_some() {
            warmed += 1;
        }
    }
    warmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;

    #[tokio::test]
    async fn test_precompute_without_embeddings_warms_nothing() {
        let chunks = vec![Chunk {
            index: 0,
            text: "some chunk text".to_string(),
            page: None,
        }];
        assert_eq!(precompute_embeddings(&NullEmbedder, &chunks).await, 0);
    }

    #[test]
    fn test_partial_answer_holds_metadata() {
        let p = PartialAnswer {
            text: "Revenue was £25.3 billion.".to_string(),
            chunk_text: "…Total revenue in 2024 was £25.3 billion…".to_string(),
            page: Some(4),
            similarity: 0.91,
        };
        assert_eq!(p.page, Some(4));
        assert!(p.similarity > 0.9);
    }
}
