//! Preference-based reranker: multi-candidate synthesis and selection.
//!
//! When enabled, the synthesizer runs once per variation and the best
//! candidate wins a weighted score of verifier confidence, embedding
//! similarity to the query, and a length factor favoring answers in the
//! 50–400 word range. Ties break by higher verifier confidence.

use super::client::LlmClient;
use super::events::{ExternalFact, InternalFact, MemoryFact, ProvenanceEntry};
use super::retriever::PartialAnswer;
use super::synthesizer::synthesize;
use super::verifier::{SourceWeights, verify};
use crate::core::relevance::cosine_similarity;
use crate::embedding::Embedder;
use crate::tools::ToolSnippet;

/// Prompt variations used to elicit diverse candidates.
pub const VARIATIONS: [&str; 3] = [
    "Prefer concise, bullet-point style.",
    "Prefer detailed narrative with full sentences.",
    "Focus on key metrics and numbers.",
];

/// Word range the length factor rewards.
const IDEAL_WORDS_MIN: usize = 50;
/// Upper bound of the rewarded word range.
const IDEAL_WORDS_MAX: usize = 400;

/// Generates `n` candidate answers with different prompt variations.
///
/// Duplicate candidates are kept so the list always has `n` entries
/// when at least one synthesis succeeds.
pub async fn generate_candidates(
    llm: &LlmClient,
    internal_facts: &[InternalFact],
    external_facts: &[ExternalFact],
    memory_facts: &[MemoryFact],
    question: &str,
    n: usize,
) -> Vec<String> {
    let mut candidates = Vec::with_capacity(n);
    for i in 0..n {
        let variation = VARIATIONS.get(i % VARIATIONS.len()).copied();
        let answer = synthesize(
            llm,
            internal_facts,
            external_facts,
            memory_facts,
            question,
            variation,
        )
        .await;
        if !answer.trim().is_empty() {
            candidates.push(answer);
        }
    }
    candidates
}

/// Selects the best candidate by weighted score.
///
/// `score = 0.5 * confidence + 0.3 * embedding_similarity + 0.2 * length_factor`.
pub async fn rank(
    embedder: &dyn Embedder,
    query: &str,
    candidates: &[String],
    provenance: &[ProvenanceEntry],
    partials: &[PartialAnswer],
    external_snippets: &[ToolSnippet],
    weights: &SourceWeights,
) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(candidates[0].clone());
    }

    let q_vec = embedder.embed(query).await;

    let mut best: Option<(f32, f32, &String)> = None;
    for candidate in candidates {
        let verification = verify(candidate, provenance, partials, external_snippets, weights);
        let confidence = verification.confidence;

        let emb_sim = match &q_vec {
            Some(q) => match embedder.embed(candidate).await {
                Some(c) => cosine_similarity(q, &c),
                None => 0.5,
            },
            None => 0.5,
        };

        let score = 0.5 * confidence + 0.3 * emb_sim + 0.2 * length_factor(candidate);

        let better = match best {
            None => true,
            // Ties break by higher verifier confidence.
            Some((best_score, best_conf, _)) => {
                score > best_score
                    || ((score - best_score).abs() < f32::EPSILON && confidence > best_conf)
            }
        };
        if better {
            best = Some((score, confidence, candidate));
        }
    }

    best.map(|(_, _, c)| c.clone())
}

/// Length factor in `[0, 1]`: 1.0 inside the ideal word range, decaying
/// linearly toward 0 outside it.
#[must_use]
pub fn length_factor(text: &str) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let words = text.split_whitespace().count() as f32;
    #[allow(clippy::cast_precision_loss)]
    let min = IDEAL_WORDS_MIN as f32;
    #[allow(clippy::cast_precision_loss)]
    let max = IDEAL_WORDS_MAX as f32;

    if words < min {
        words / min
    } else if words > max {
        max / words
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_factor_in_range() {
        let text = "word ".repeat(100);
        assert!((length_factor(&text) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_length_factor_too_short() {
        let text = "word ".repeat(10);
        let f = length_factor(&text);
        assert!(f < 1.0);
        assert!((f - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_length_factor_too_long() {
        let text = "word ".repeat(800);
        let f = length_factor(&text);
        assert!(f < 1.0);
        assert!((f - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_length_factor_empty() {
        assert_eq!(length_factor(""), 0.0);
    }

    #[tokio::test]
    async fn test_rank_empty_candidates() {
        use crate::embedding::NullEmbedder;
        let result = rank(
            &NullEmbedder,
            "q",
            &[],
            &[],
            &[],
            &[],
            &SourceWeights::default(),
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_rank_single_candidate_shortcut() {
        use crate::embedding::NullEmbedder;
        let candidates = vec!["the only answer".to_string()];
        let result = rank(
            &NullEmbedder,
            "q",
            &candidates,
            &[],
            &[],
            &[],
            &SourceWeights::default(),
        )
        .await;
        assert_eq!(result.as_deref(), Some("the only answer"));
    }
}
