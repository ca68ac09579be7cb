//! LLM-assisted tool planner.
//!
//! Builds a prompt enumerating the conceptual knowledge base and the
//! configured providers, asks the model for a strict-JSON plan, and
//! parses it defensively. Any parse failure produces the documented
//! fallback plan rather than an error.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::registry::{GENERIC_PROVIDER, ToolRegistry};
use super::{ToolCategory, knowledge_base};
use crate::agent::client::LlmClient;
use crate::agent::prompt::build_planner_prompt;

/// The planner's decision: which category of knowledge to consult and
/// which configured providers to use.
///
/// An empty `recommended_providers` list is a valid output meaning the
/// answer is likely available internally and tools should be skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPlan {
    /// Knowledge category to consult.
    pub category: ToolCategory,
    /// Provider ids to execute, in preference order.
    pub recommended_providers: Vec<String>,
    /// Planner's rationale.
    #[serde(default)]
    pub reason: String,
}

impl ToolPlan {
    /// The documented fallback plan used when planner output cannot be
    /// parsed: the generic category, backed by SerpAPI when configured.
    #[must_use]
    pub fn fallback(registry: &ToolRegistry) -> Self {
        let provider = if registry.get("serpapi").is_some() {
            "serpapi".to_string()
        } else {
            GENERIC_PROVIDER.to_string()
        };
        Self {
            category: ToolCategory::Generic,
            recommended_providers: vec![provider],
            reason: "fallback".to_string(),
        }
    }
}

/// Raw plan shape as the model emits it; categories arrive as strings.
#[derive(Debug, Deserialize)]
struct RawPlan {
    category: String,
    recommended_providers: Vec<String>,
    #[serde(default)]
    reason: String,
}

/// Plans which external providers to consult for a query.
///
/// Never fails: an empty or unparseable model response yields
/// [`ToolPlan::fallback`].
pub async fn plan_tools(llm: &LlmClient, registry: &ToolRegistry, query: &str) -> ToolPlan {
    let kb = knowledge_base();
    let configured: Vec<(String, ToolCategory)> = registry
        .provider_ids()
        .into_iter()
        .filter_map(|id| registry.get(id).map(|p| (id.to_string(), p.category)))
        .collect();

    let prompt = build_planner_prompt(query, &kb, &configured);
    let raw = llm.generate_with(None, &prompt, true).await;

    match parse_plan(&raw) {
        Some(plan) => {
            tracing::debug!(
                category = %plan.category,
                providers = ?plan.recommended_providers,
                "tool plan"
            );
            plan
        }
        None => {
            tracing::debug!("tool planner output unparseable, using fallback");
            ToolPlan::fallback(registry)
        }
    }
}

/// Extracts the first valid plan object from model output.
///
/// Scans for brace-delimited JSON candidates so surrounding prose or
/// code fences do not break parsing.
fn parse_plan(raw: &str) -> Option<ToolPlan> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    // Whole-output parse first, then embedded-object scan.
    if let Some(plan) = parse_raw_plan(text) {
        return Some(plan);
    }

    let object_pattern =
        Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").unwrap_or_else(|_| unreachable!());
    let result = object_pattern
        .find_iter(text)
        .find_map(|m| parse_raw_plan(m.as_str()));
    result
}

fn parse_raw_plan(candidate: &str) -> Option<ToolPlan> {
    let raw: RawPlan = serde_json::from_str(candidate).ok()?;
    Some(ToolPlan {
        category: ToolCategory::parse(&raw.category),
        recommended_providers: raw.recommended_providers,
        reason: raw.reason,
    })
}
