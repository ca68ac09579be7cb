//! Routing classifier: is internal evidence likely sufficient?
//!
//! Pure local computation over token overlap. No LLM calls, no
//! embedding calls, no timeouts; the pipeline's entry gate must never
//! block on a remote service.

use crate::core::chunking::Chunk;
use crate::core::relevance::token_overlap_top_k;

/// Overlap score at or above which the document alone is judged
/// sufficient.
pub const INTERNAL_SUFFICIENT_THRESHOLD: f32 = 0.70;

/// The classifier's routing decision.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Internal retrieval alone is likely sufficient.
    pub internal_sufficient: bool,
    /// External data should be fetched.
    pub external_needed: bool,
    /// Human-readable rationale.
    pub reason: String,
}

/// Classifies whether the document can answer the query on its own.
///
/// Takes the max token-overlap similarity across chunks; at or above
/// [`INTERNAL_SUFFICIENT_THRESHOLD`] the document is sufficient. Zero
/// chunks always routes external.
#[must_use]
pub fn classify(query: &str, chunks: &[Chunk]) -> Classification {
    if chunks.is_empty() {
        return Classification {
            internal_sufficient: false,
            external_needed: true,
            reason: "no chunks extracted from document".to_string(),
        };
    }

    let max_similarity = token_overlap_top_k(query, chunks, 1, 0.0)
        .first()
        .map_or(0.0, |s| s.similarity);

    let internal_sufficient = max_similarity >= INTERNAL_SUFFICIENT_THRESHOLD;
    Classification {
        internal_sufficient,
        external_needed: !internal_sufficient,
        reason: format!("max token-overlap similarity {max_similarity:.2}"),
    }
}
