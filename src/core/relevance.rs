//! Relevance scoring over chunk lists.
//!
//! Two scoring paths: a fast local token-overlap score with no I/O, and a
//! cosine score over embeddings that silently falls back to token overlap
//! when embeddings are unavailable. The classifier relies on the
//! token-overlap path exclusively so it can never block on a remote call.

use std::collections::HashSet;

use crate::core::chunking::Chunk;
use crate::embedding::Embedder;

/// A chunk scored against a query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Chunk text.
    pub chunk_text: String,
    /// Position of the chunk in the source sequence.
    pub idx: usize,
    /// 1-based page, when known.
    pub page: Option<u32>,
    /// Similarity in `[0, 1]`.
    pub similarity: f32,
}

/// Tokenizes text for overlap scoring: lowercase, split on
/// non-alphanumerics, drop tokens of length <= 2.
#[must_use]
pub fn overlap_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(ToString::to_string)
        .collect()
}

/// Scores chunks by token overlap with the query.
///
/// Score is `|query_tokens ∩ chunk_tokens| / max(1, |query_tokens|)`.
/// Returns the top `top_k` chunks at or above `threshold`, sorted by
/// similarity descending. Purely local; no network calls.
#[must_use]
pub fn token_overlap_top_k(
    query: &str,
    chunks: &[Chunk],
    top_k: usize,
    threshold: f32,
) -> Vec<ScoredChunk> {
    let q_tokens = overlap_tokens(query);
    if q_tokens.is_empty() || chunks.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredChunk> = chunks
        .iter()
        .filter_map(|chunk| {
            let c_tokens = overlap_tokens(&chunk.text);
            let overlap = q_tokens.intersection(&c_tokens).count();
            #[allow(clippy::cast_precision_loss)]
            let sim = (overlap as f32 / q_tokens.len().max(1) as f32).clamp(0.0, 1.0);
            (sim >= threshold).then(|| ScoredChunk {
                chunk_text: chunk.text.clone(),
                idx: chunk.index,
                page: chunk.page,
                similarity: sim,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(top_k);
    scored
}

/// Cosine similarity of two L2-normalized vectors, clamped to `[0, 1]`.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>().clamp(0.0, 1.0)
}

/// Maximum number of chunk embeddings computed per query.
const MAX_EMBEDDED_CHUNKS: usize = 15;

/// Scores chunks by embedding cosine similarity, falling back to token
/// overlap when the query or every chunk embedding is unavailable.
///
/// The query is embedded once; chunk embeddings are computed (or served
/// from the embedder's cache) for at most the first
/// [`MAX_EMBEDDED_CHUNKS`] chunks.
pub async fn embedding_top_k(
    embedder: &dyn Embedder,
    query: &str,
    chunks: &[Chunk],
    top_k: usize,
    threshold: f32,
) -> Vec<ScoredChunk> {
    if chunks.is_empty() {
        return Vec::new();
    }

    let Some(q_vec) = embedder.embed(query).await else {
        return token_overlap_top_k(query, chunks, top_k, 0.0);
    };

    let mut scored = Vec::new();
    for chunk in chunks.iter().take(MAX_EMBEDDED_CHUNKS) {
        let head: String = chunk.text.chars().take(2000).collect();
        let Some(c_vec) = embedder.embed(&head).await else {
            continue;
        };
        let sim = cosine_similarity(&q_vec, &c_vec);
        if sim >= threshold {
            scored.push(ScoredChunk {
                chunk_text: chunk.text.clone(),
                idx: chunk.index,
                page: chunk.page,
                similarity: sim,
            });
        }
    }

    if scored.is_empty() {
        return token_overlap_top_k(query, chunks, top_k, 0.0);
    }

    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            page: None,
        }
    }

    #[test]
    fn test_overlap_tokens_drops_short_tokens() {
        let tokens = overlap_tokens("The Q3 revenue is up");
        assert!(tokens.contains("revenue"));
        assert!(!tokens.contains("is"));
        assert!(!tokens.contains("q3"));
    }

    #[test]
    fn test_token_overlap_ranks_by_similarity() {
        let chunks = vec![
            chunk(0, "budget allocation for the fiscal year shows increases"),
            chunk(1, "unrelated content about weather patterns"),
        ];
        let scored = token_overlap_top_k("budget allocation fiscal year", &chunks, 5, 0.0);
        assert_eq!(scored[0].idx, 0);
        assert!(scored[0].similarity > scored[1].similarity);
        assert!(scored[0].similarity > 0.9);
    }

    #[test]
    fn test_token_overlap_empty_query() {
        let chunks = vec![chunk(0, "some text here")];
        assert!(token_overlap_top_k("a is", &chunks, 5, 0.0).is_empty());
    }

    #[test]
    fn test_token_overlap_threshold_filters() {
        let chunks = vec![chunk(0, "nothing in common whatsoever")];
        let scored = token_overlap_top_k("total revenue 2024", &chunks, 5, 0.1);
        assert!(scored.is_empty());
    }

    #[test]
    fn test_cosine_similarity_identity() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_dims() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_negative_clamped() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_embedding_top_k_falls_back_to_token_overlap() {
        use crate::embedding::NullEmbedder;
        let chunks = vec![
            chunk(0, "budget allocation for the fiscal year"),
            chunk(1, "weather patterns in coastal regions"),
        ];
        let scored = embedding_top_k(&NullEmbedder, "budget allocation", &chunks, 5, 0.0).await;
        assert!(!scored.is_empty());
        assert_eq!(scored[0].idx, 0);
    }

    #[test]
    fn test_token_overlap_is_fast() {
        let chunks: Vec<Chunk> = (0..100)
            .map(|i| chunk(i, "the quick brown fox jumps over the lazy dog near the riverbank"))
            .collect();
        let start = std::time::Instant::now();
        let _ = token_overlap_top_k("quick brown fox riverbank", &chunks, 10, 0.0);
        assert!(start.elapsed().as_millis() < 100);
    }
}
