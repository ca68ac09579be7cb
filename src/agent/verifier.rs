//! Verifier agent: confidence scoring and quality flags.
//!
//! Operates only on system-computed structures: the answer text, the
//! provenance list, and the raw snippets. It never inspects the answer
//! for provenance labels; attribution is already authoritative by the
//! time verification runs.

use regex::Regex;

use super::events::{ProvenanceEntry, SourceKind};
use super::retriever::PartialAnswer;
use crate::tools::{ToolCategory, ToolSnippet};

/// External evidence present but every external source is generic web.
pub const ONLY_GENERIC_WEB: &str = "ONLY_GENERIC_WEB";
/// Two sources disagree on a numeric figure.
pub const NUMERIC_CONTRADICTION: &str = "NUMERIC_CONTRADICTION";
/// External evidence is dated well outside the current window.
pub const OUTDATED_EXTERNAL_DATA: &str = "OUTDATED_EXTERNAL_DATA";
/// Too few answer sentences are supported by provenance text.
pub const LOW_EVIDENCE_COVERAGE: &str = "LOW_EVIDENCE_COVERAGE";
/// The answer contains figures or entities absent from all evidence.
pub const POTENTIAL_HALLUCINATION: &str = "POTENTIAL_HALLUCINATION";
/// Appended by the orchestrator when the targeted external completion
/// path fired; the verifier itself never sets it.
pub const PARTIAL_EXTERNAL_COMPLETION: &str = "PARTIAL_EXTERNAL_COMPLETION";

/// Coverage below which [`LOW_EVIDENCE_COVERAGE`] is raised.
const COVERAGE_FLAG_THRESHOLD: f32 = 0.4;
/// Years older than this many before now are considered stale.
const STALE_YEARS: i32 = 5;
/// Numeric difference above which two first-values conflict.
const NUMERIC_CONFLICT_DELTA: f64 = 0.5;

/// Per-source quality weights used in confidence scoring.
///
/// Defaults reflect how citable each source class is for financial
/// research; deployments can override any weight.
#[derive(Debug, Clone, Copy)]
pub struct SourceWeights {
    /// The document itself.
    pub internal: f32,
    /// Official filings and disclosures.
    pub regulatory: f32,
    /// Issuer credit ratings.
    pub credit: f32,
    /// Macroeconomic series.
    pub macroeconomic: f32,
    /// Company fundamentals.
    pub financials: f32,
    /// Market prices.
    pub market: f32,
    /// News coverage.
    pub news: f32,
    /// Generic web search.
    pub generic: f32,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            internal: 1.0,
            regulatory: 0.9,
            credit: 0.85,
            macroeconomic: 0.85,
            financials: 0.8,
            market: 0.8,
            news: 0.7,
            generic: 0.5,
        }
    }
}

impl SourceWeights {
    /// Weight for an external source category.
    #[must_use]
    pub const fn for_category(&self, category: ToolCategory) -> f32 {
        match category {
            ToolCategory::Regulatory => self.regulatory,
            ToolCategory::Credit => self.credit,
            ToolCategory::Macro => self.macroeconomic,
            ToolCategory::Financials => self.financials,
            ToolCategory::Market => self.market,
            ToolCategory::News => self.news,
            ToolCategory::Generic => self.generic,
        }
    }
}

/// Verifier output: confidence, quality flags, and a human explanation.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Quality flags.
    pub flags: Vec<String>,
    /// Human-readable scoring summary.
    pub explanation: String,
}

/// Scores answer quality from provenance and evidence structures.
///
/// Confidence blends four signals: the best internal similarity, the
/// mean source quality, sentence-level evidence coverage, and a
/// consistency score reduced by contradiction, staleness, and
/// hallucination penalties.
#[must_use]
pub fn verify(
    answer: &str,
    provenance: &[ProvenanceEntry],
    partials: &[PartialAnswer],
    external_snippets: &[ToolSnippet],
    weights: &SourceWeights,
) -> Verification {
    let mut flags: Vec<String> = Vec::new();

    let mut max_internal_sim: f32 = partials.iter().map(|p| p.similarity).fold(0.0, f32::max);
    let mut internal_count = 0usize;
    let mut external_count = 0usize;
    let mut source_scores: Vec<f32> = Vec::new();

    for entry in provenance {
        match entry.kind {
            SourceKind::Internal => {
                internal_count += 1;
                if let Some(sim) = entry.similarity {
                    max_internal_sim = max_internal_sim.max(sim);
                }
                source_scores.push(weights.internal);
            }
            SourceKind::External => {
                external_count += 1;
                let category = entry.category.unwrap_or(ToolCategory::Generic);
                source_scores.push(weights.for_category(category));
            }
        }
    }

    let external_weights: Vec<f32> = provenance
        .iter()
        .filter(|p| p.kind == SourceKind::External)
        .map(|p| weights.for_category(p.category.unwrap_or(ToolCategory::Generic)))
        .collect();
    if external_count > 0 && external_weights.iter().all(|&w| w <= 0.5) {
        flags.push(ONLY_GENERIC_WEB.to_string());
    }

    if has_numeric_contradiction(provenance) {
        flags.push(NUMERIC_CONTRADICTION.to_string());
    }

    let stale_external = provenance
        .iter()
        .filter(|p| p.kind == SourceKind::External)
        .any(|p| has_stale_dates(&p.text))
        || external_snippets.iter().any(|s| !s.error && has_stale_dates(&s.text));
    if stale_external {
        flags.push(OUTDATED_EXTERNAL_DATA.to_string());
    }

    let coverage = coverage_score(answer, provenance);
    if coverage < COVERAGE_FLAG_THRESHOLD && !provenance.is_empty() {
        flags.push(LOW_EVIDENCE_COVERAGE.to_string());
    }

    let answer_lower = answer.to_lowercase();
    let declares_insufficient =
        answer_lower.contains("insufficient") || answer_lower.contains("not found");
    if !declares_insufficient && looks_hallucinated(answer, provenance, coverage) {
        flags.push(POTENTIAL_HALLUCINATION.to_string());
    }

    #[allow(clippy::cast_precision_loss)]
    let source_quality = if source_scores.is_empty() {
        0.0
    } else {
        source_scores.iter().sum::<f32>() / source_scores.len() as f32
    };

    let mut consistency: f32 = 1.0;
    if flags.iter().any(|f| f == NUMERIC_CONTRADICTION) {
        consistency -= 0.5;
    }
    if flags.iter().any(|f| f == OUTDATED_EXTERNAL_DATA) {
        consistency -= 0.3;
    }
    if flags.iter().any(|f| f == POTENTIAL_HALLUCINATION) {
        consistency -= 0.4;
    }
    consistency = consistency.max(0.0);

    let mut confidence = 0.4 * max_internal_sim
        + 0.3 * source_quality
        + 0.2 * coverage
        + 0.1 * consistency;
    confidence = confidence.clamp(0.0, 1.0);

    // Corroborated answers (document plus external source) are floored;
    // self-declared insufficiency is capped.
    if internal_count > 0 && external_count > 0 {
        confidence = confidence.max(0.6);
    }
    if answer_lower.contains("insufficient") {
        confidence = confidence.min(0.4);
    }

    let mut parts: Vec<String> = Vec::new();
    if internal_count > 0 {
        parts.push(format!(
            "{internal_count} internal source(s), max similarity {max_internal_sim:.2}"
        ));
    }
    if external_count > 0 {
        parts.push(format!("{external_count} external corroboration(s)"));
    }
    if !flags.is_empty() {
        parts.push(format!("Flags: {}", flags.join(", ")));
    }
    let explanation = if parts.is_empty() {
        "No provenance.".to_string()
    } else {
        parts.join(". ")
    };

    Verification {
        confidence,
        flags,
        explanation,
    }
}

/// Extracts numeric values from text: percentages first, then plain
/// decimals. Bare single digits inside identifiers are ignored.
fn extract_numbers(text: &str) -> Vec<f64> {
    let percent = Regex::new(r"\b(\d{1,3}(?:,\d{3})*(?:\.\d+)?)\s*%")
        .unwrap_or_else(|_| unreachable!());
    let numbers: Vec<f64> = percent
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().replace(',', "").parse().ok())
        .collect();
    if !numbers.is_empty() {
        return numbers;
    }

    let decimal = Regex::new(r"\b(\d{1,3}(?:,\d{3})*\.\d+)\b").unwrap_or_else(|_| unreachable!());
    decimal
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().replace(',', "").parse().ok())
        .collect()
}

/// True when the leading figures of two sources disagree by more than
/// the conflict delta.
fn has_numeric_contradiction(provenance: &[ProvenanceEntry]) -> bool {
    if provenance.len() < 2 {
        return false;
    }
    let first_values: Vec<f64> = provenance
        .iter()
        .filter_map(|p| extract_numbers(&p.text).first().copied())
        .collect();
    if first_values.len() < 2 {
        return false;
    }
    let max = first_values.iter().copied().fold(f64::MIN, f64::max);
    let min = first_values.iter().copied().fold(f64::MAX, f64::min);
    max - min > NUMERIC_CONFLICT_DELTA
}

/// Detects years implausibly far from now (future, or stale beyond the
/// window) in evidence text.
fn has_stale_dates(text: &str) -> bool {
    let year_re = Regex::new(r"\b(20\d{2})\b").unwrap_or_else(|_| unreachable!());
    let current_year = chrono::Datelike::year(&chrono::Utc::now());
    let result = year_re
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<i32>().ok())
        .any(|y| y > current_year || y < current_year - STALE_YEARS);
    result
}

/// Fraction of answer sentences whose leading tokens appear in the
/// concatenated provenance text.
fn coverage_score(answer: &str, provenance: &[ProvenanceEntry]) -> f32 {
    if answer.is_empty() || provenance.is_empty() {
        return 0.0;
    }

    let sentences: Vec<&str> = answer
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() > 10)
        .collect();
    if sentences.is_empty() {
        return 1.0;
    }

    let prov_text = provenance
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let covered = sentences
        .iter()
        .filter(|s| {
            s.to_lowercase()
                .split_whitespace()
                .take(3)
                .any(|w| prov_text.contains(w))
        })
        .count();

    #[allow(clippy::cast_precision_loss)]
    let score = covered as f32 / sentences.len() as f32;
    score
}

/// Heuristic hallucination check: no evidence at all, nearly no
/// coverage, or answer figures or named entities absent from every
/// provenance text.
fn looks_hallucinated(answer: &str, provenance: &[ProvenanceEntry], coverage: f32) -> bool {
    if provenance.is_empty() {
        return true;
    }
    if coverage < 0.3 {
        return true;
    }

    let prov_text = provenance
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if extract_numbers(answer)
        .iter()
        .any(|n| !extract_numbers(&prov_text).contains(n))
    {
        return true;
    }

    let prov_lower = prov_text.to_lowercase();
    entity_tokens(answer)
        .iter()
        .any(|e| !prov_lower.contains(&e.to_lowercase()))
}

/// Crude named-entity cues: capitalized words that start inside a
/// sentence. Acronyms and ticker-style tokens (no lowercase after the
/// first letter) are excluded; the numeric scan covers those.
fn entity_tokens(text: &str) -> Vec<String> {
    let mut entities = Vec::new();
    let mut sentence_start = true;
    for raw in text.split_whitespace() {
        let word: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();
        let candidate = !sentence_start
            && word.chars().count() >= 4
            && word.chars().next().is_some_and(char::is_uppercase)
            && word.chars().skip(1).any(char::is_lowercase);
        if candidate {
            entities.push(word);
        }
        sentence_start = raw.ends_with(['.', '!', '?', ':']);
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::{InternalFact, ProvenanceEntry};

    fn internal_entry(text: &str, similarity: f32) -> ProvenanceEntry {
        ProvenanceEntry::internal(
            "/docs/report.pdf",
            &InternalFact {
                text: text.to_string(),
                page: Some(1),
                similarity: Some(similarity),
            },
        )
    }

    fn external_entry(text: &str, category: ToolCategory) -> ProvenanceEntry {
        ProvenanceEntry {
            kind: SourceKind::External,
            source: "https://example/q".to_string(),
            page: None,
            tool: Some("serpapi".to_string()),
            category: Some(category),
            text: text.to_string(),
            similarity: None,
        }
    }

    #[test]
    fn test_extract_numbers_percentages_first() {
        let nums = extract_numbers("CET1 was 14.2% against a 10.5% floor");
        assert_eq!(nums, vec![14.2, 10.5]);
    }

    #[test]
    fn test_extract_numbers_decimals_fallback() {
        let nums = extract_numbers("revenue of 25.3 billion");
        assert_eq!(nums, vec![25.3]);
    }

    #[test]
    fn test_numeric_contradiction_detected() {
        let prov = vec![
            internal_entry("CET1 = 14.2%", 0.9),
            external_entry("CET1 = 12.8%", ToolCategory::Generic),
        ];
        assert!(has_numeric_contradiction(&prov));
    }

    #[test]
    fn test_numeric_agreement_not_flagged() {
        let prov = vec![
            internal_entry("CET1 = 14.2%", 0.9),
            external_entry("CET1 = 14.2%", ToolCategory::Generic),
        ];
        assert!(!has_numeric_contradiction(&prov));
    }

    #[test]
    fn test_contradiction_reduces_confidence() {
        let answer = "CET1 = 14.2% per the filing.";
        let agree = vec![
            internal_entry("CET1 = 14.2%", 0.9),
            external_entry("CET1 = 14.2%", ToolCategory::Regulatory),
        ];
        let conflict = vec![
            internal_entry("CET1 = 14.2%", 0.9),
            external_entry("CET1 = 12.8%", ToolCategory::Regulatory),
        ];
        let ok = verify(answer, &agree, &[], &[], &SourceWeights::default());
        let bad = verify(answer, &conflict, &[], &[], &SourceWeights::default());
        assert!(bad.flags.iter().any(|f| f == NUMERIC_CONTRADICTION));
        assert!(bad.confidence < ok.confidence || bad.confidence <= 0.6 + f32::EPSILON);
    }

    #[test]
    fn test_only_generic_web_flag() {
        let answer = "Market cap is around $290B today per search results.";
        let prov = vec![external_entry(
            "Market cap is around $290B today",
            ToolCategory::Generic,
        )];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(v.flags.iter().any(|f| f == ONLY_GENERIC_WEB));
    }

    #[test]
    fn test_regulatory_source_not_only_generic() {
        let answer = "The filing reports capital adequacy above requirements.";
        let prov = vec![external_entry(
            "filing reports capital adequacy above requirements",
            ToolCategory::Regulatory,
        )];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(!v.flags.iter().any(|f| f == ONLY_GENERIC_WEB));
    }

    #[test]
    fn test_external_only_confidence_below_half() {
        let answer = "GDP growth is 7.2 according to external sources.";
        let prov = vec![external_entry("GDP 7.2", ToolCategory::Generic)];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(v.confidence < 0.5);
    }

    #[test]
    fn test_internal_plus_external_floor() {
        let answer = "Revenue was 100 billion and market cap is 290 billion.";
        let prov = vec![
            internal_entry("Revenue was 100 billion", 0.85),
            external_entry("market cap is 290 billion", ToolCategory::Generic),
        ];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(v.confidence >= 0.6);
    }

    #[test]
    fn test_confidence_bounds() {
        let prov = vec![internal_entry("Revenue was £25.3 billion", 1.0)];
        let v = verify(
            "Revenue was £25.3 billion.",
            &prov,
            &[],
            &[],
            &SourceWeights::default(),
        );
        assert!((0.0..=1.0).contains(&v.confidence));
    }

    #[test]
    fn test_empty_everything() {
        let v = verify("", &[], &[], &[], &SourceWeights::default());
        // Only the consistency term contributes, reduced by the
        // no-evidence hallucination penalty.
        assert!(v.confidence < 0.1);
        assert!(v.flags.iter().any(|f| f == POTENTIAL_HALLUCINATION));
    }

    #[test]
    fn test_insufficient_answer_capped() {
        let prov = vec![internal_entry("some partial evidence here", 0.95)];
        let v = verify(
            "The document contains insufficient information to answer.",
            &prov,
            &[],
            &[],
            &SourceWeights::default(),
        );
        assert!(v.confidence <= 0.4);
    }

    #[test]
    fn test_stale_dates_flagged() {
        let answer = "The figure dates back a while.";
        let prov = vec![
            internal_entry("The figure dates back a while indeed", 0.9),
            external_entry("Reported in 2014 at 3.1%", ToolCategory::News),
        ];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(v.flags.iter().any(|f| f == OUTDATED_EXTERNAL_DATA));
    }

    #[test]
    fn test_hallucinated_number_flagged() {
        let answer = "Net income reached 47.9 in the period.";
        let prov = vec![internal_entry("Net income reached a record level", 0.9)];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(v.flags.iter().any(|f| f == POTENTIAL_HALLUCINATION));
    }

    #[test]
    fn test_hallucinated_entity_flagged() {
        let answer = "Results were confirmed by Acmecorp analysts.";
        let prov = vec![internal_entry("Results were confirmed by analysts", 0.9)];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(v.flags.iter().any(|f| f == POTENTIAL_HALLUCINATION));
    }

    #[test]
    fn test_supported_entity_not_flagged() {
        let answer = "Results were confirmed by Acmecorp analysts.";
        let prov = vec![internal_entry(
            "Results were confirmed by Acmecorp analysts during the review",
            0.9,
        )];
        let v = verify(answer, &prov, &[], &[], &SourceWeights::default());
        assert!(!v.flags.iter().any(|f| f == POTENTIAL_HALLUCINATION));
    }

    #[test]
    fn test_entity_tokens_skip_sentence_starts_and_acronyms() {
        let tokens = entity_tokens("The CET1 ratio held. Barclays cited GDP data from Moody's.");
        // "Barclays" opens a sentence; "CET1" and "GDP" are acronym-like.
        assert_eq!(tokens, vec!["Moodys"]);
    }

    #[test]
    fn test_verifier_never_sets_partial_completion() {
        let prov = vec![
            internal_entry("Revenue was 100 billion", 0.9),
            external_entry("market cap 290 billion", ToolCategory::Generic),
        ];
        let v = verify(
            "Revenue was 100 billion and market cap 290 billion.",
            &prov,
            &[],
            &[],
            &SourceWeights::default(),
        );
        assert!(!v.flags.iter().any(|f| f == PARTIAL_EXTERNAL_COMPLETION));
    }
}
