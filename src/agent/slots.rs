//! Missing-slot heuristic for partial external completion.
//!
//! A slot is a named piece of financial information a query may ask
//! for. The table is deliberately small and domain-specific: each slot
//! maps to the trigger phrases that mark it as requested in a query or
//! as present in the document's evidence. The common "document has X
//! but not Y" case is detected here without waiting for the classifier
//! to route externally.

use super::events::InternalFact;

/// Slot name → trigger phrases.
const SLOT_TRIGGERS: &[(&str, &[&str])] = &[
    ("market capitalization", &["market cap", "market capitalization", "market value"]),
    ("revenue", &["revenue", "total revenue", "sales"]),
    ("net income", &["net income", "profit", "earnings"]),
    ("total assets", &["total assets", "asset base"]),
    ("liabilities", &["liabilities"]),
    ("share price", &["share price", "stock price"]),
    ("interest rate", &["interest rate", "policy rate"]),
    ("capital ratio", &["capital ratio", "cet1", "tier 1"]),
];

/// Comparison markers that make multi-slot queries demand completeness.
const COMPARISON_MARKERS: &[&str] = &["compare", "versus", " vs ", " and "];

/// Slots the query asks about: any trigger phrase appears in the
/// lowercased query.
#[must_use]
pub fn requested_slots(query: &str) -> Vec<&'static str> {
    let q = query.to_lowercase();
    SLOT_TRIGGERS
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|t| q.contains(t)))
        .map(|(slot, _)| *slot)
        .collect()
}

/// Requested slots with no trigger phrase in the joined internal fact
/// texts.
#[must_use]
pub fn extract_missing_slots(query: &str, internal_facts: &[InternalFact]) -> Vec<&'static str> {
    let q = query.to_lowercase();
    let facts_text = internal_facts
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    SLOT_TRIGGERS
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|t| q.contains(t)))
        .filter(|(_, triggers)| !triggers.iter().any(|t| facts_text.contains(t)))
        .map(|(slot, _)| *slot)
        .collect()
}

/// Whether the internal evidence leaves the query under-answered.
///
/// True when any requested slot is missing from the internal facts. A
/// comparison query (`compare`, `versus`, `vs`, `and`) over two or more
/// slots with at least one missing always qualifies.
#[must_use]
pub fn is_incomplete(query: &str, internal_facts: &[InternalFact]) -> bool {
    let missing = extract_missing_slots(query, internal_facts);
    if missing.is_empty() {
        return false;
    }

    let q = query.to_lowercase();
    let compares = COMPARISON_MARKERS.iter().any(|m| q.contains(m));
    if compares && requested_slots(query).len() >= 2 {
        return true;
    }
    !missing.is_empty()
}
