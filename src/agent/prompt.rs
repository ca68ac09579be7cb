//! System prompts and template builders for agents.
//!
//! The synthesizer instruction is a contract, not a suggestion: the
//! model is told to omit provenance labels, and the three fact sections
//! always appear, empty ones marked `(none)`, so absence can never be
//! mistaken for irrelevance. Attribution stays system-computed.

use std::fmt::Write;

use super::events::{ExternalFact, InternalFact, MemoryFact};
use crate::tools::{ConceptualTool, ToolCategory};

/// Sentinel a chunk-analysis call returns when the chunk cannot answer
/// the question.
pub const NOT_RELEVANT: &str = "NOT RELEVANT";

/// System instruction for the synthesizer.
pub const SYNTHESIZER_SYSTEM_PROMPT: &str = "You are synthesizing a financial research answer. \
Use ONLY the provided facts. Do NOT add any provenance labels. Do NOT write [INTERNAL] or \
[EXTERNAL]. Just write the answer text. Respect any length or format requested in the question.";

/// System instruction for the tool planner.
pub const PLANNER_SYSTEM_PROMPT: &str = "You are a Tool Planner for a BFSI Investment Research \
Agent. Your job is to decide which external knowledge sources are most reliable to answer the \
user's question.";

/// Builds the per-chunk extraction prompt for the retriever agent.
#[must_use]
pub fn build_chunk_prompt(chunk: &str, question: &str, idx: usize, total: usize) -> String {
    format!(
        "You are an expert analyst. Answer the question using ONLY the text in this chunk.\n\n\
         CHUNK {idx}/{total}:\n{chunk}\n\n\
         QUESTION:\n{question}\n\n\
         INSTRUCTIONS:\n\
         - If the chunk does not contain information that answers the question, reply exactly: {NOT_RELEVANT}\n\
         - Otherwise: give a short partial answer (1-3 sentences) and one-line rationale."
    )
}

fn push_section(prompt: &mut String, heading: &str, lines: &[String]) {
    let _ = writeln!(prompt, "{heading}");
    if lines.is_empty() {
        prompt.push_str("- (none)\n");
    } else {
        for line in lines {
            let _ = writeln!(prompt, "- {line}");
        }
    }
    prompt.push('\n');
}

/// Builds the synthesizer user message from the three structured fact
/// lists. All three sections always appear; empty ones carry an
/// explicit `(none)` marker.
#[must_use]
pub fn build_synthesis_prompt(
    internal_facts: &[InternalFact],
    external_facts: &[ExternalFact],
    memory_facts: &[MemoryFact],
    question: &str,
    variation: Option<&str>,
) -> String {
    let mut prompt = String::new();

    push_section(
        &mut prompt,
        "INTERNAL FACTS:",
        &internal_facts.iter().map(|f| f.text.clone()).collect::<Vec<_>>(),
    );
    push_section(
        &mut prompt,
        "EXTERNAL FACTS:",
        &external_facts.iter().map(|f| f.text.clone()).collect::<Vec<_>>(),
    );
    push_section(
        &mut prompt,
        "PRIOR MEMORY:",
        &memory_facts.iter().map(|f| f.text.clone()).collect::<Vec<_>>(),
    );

    let _ = write!(prompt, "QUESTION:\n{question}\n\n");
    if let Some(var) = variation {
        let _ = write!(prompt, "{var}\n\n");
    }
    prompt.push_str("ANSWER:\n");
    prompt
}

/// Builds the planner user message enumerating the knowledge base and
/// the configured providers.
#[must_use]
pub fn build_planner_prompt(
    query: &str,
    knowledge_base: &[ConceptualTool],
    configured: &[(String, ToolCategory)],
) -> String {
    let mut prompt = format!("{PLANNER_SYSTEM_PROMPT}\n\n");

    prompt.push_str(
        "Categories include:\nregulatory filings, company financials, macroeconomic data, \
         market prices, credit ratings, financial news, generic web search.\n\n",
    );

    prompt.push_str("TOOL_KNOWLEDGE_BASE:\n");
    for tool in knowledge_base {
        let _ = writeln!(
            prompt,
            "- {}: category={}, purpose={}, example_providers={:?}",
            tool.key, tool.category, tool.purpose, tool.example_providers
        );
    }

    prompt.push_str("\nCONFIGURED PROVIDERS (currently available):\n");
    if configured.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for (id, category) in configured {
            let _ = writeln!(prompt, "- {id}: category={category}");
        }
    }

    prompt.push_str(
        "\nIf the answer is likely available internally (e.g. from the PDF/annual report), \
         return recommended_providers: [].\n\n\
         Given the user question, output a JSON object strictly in this format:\n\
         {\n\
           \"category\": \"<one of the categories>\",\n\
           \"recommended_providers\": [\"provider1\", \"provider2\"],\n\
           \"reason\": \"why these providers are suitable\"\n\
         }\n\n",
    );
    let _ = write!(prompt, "Question: {query}\n\nOutput only valid JSON, no other text.");
    prompt
}
