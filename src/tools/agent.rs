//! Composed external search: planner → credential handshake → executor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::executor::ToolExecutor;
use super::planner::plan_tools;
use super::registry::{CredentialPrompt, ToolRegistry, resolve_providers};
use super::ToolSnippet;
use crate::agent::client::LlmClient;

/// External evidence acquisition for a query.
///
/// The orchestrator talks to this trait rather than the concrete
/// pipeline so evaluation harnesses can substitute scripted results.
#[async_trait]
pub trait ExternalSearch: Send + Sync {
    /// Searches external sources for the query. Returns the snippet list
    /// plus its concatenation as one plain-text block. Never fails: any
    /// internal problem yields `("", [])`.
    async fn search(&self, query: &str) -> (String, Vec<ToolSnippet>);
}

/// Production external search: plans providers with the LLM, resolves
/// credentials, and executes the chosen providers.
pub struct ToolAgent {
    llm: LlmClient,
    registry: ToolRegistry,
    executor: ToolExecutor,
    prompt: Arc<dyn CredentialPrompt>,
}

impl ToolAgent {
    /// Creates a tool agent with the given per-call timeout.
    #[must_use]
    pub fn new(
        llm: LlmClient,
        registry: ToolRegistry,
        prompt: Arc<dyn CredentialPrompt>,
        call_timeout: Duration,
    ) -> Self {
        let executor = ToolExecutor::new(registry.clone(), call_timeout);
        Self {
            llm,
            registry,
            executor,
            prompt,
        }
    }
}

#[async_trait]
impl ExternalSearch for ToolAgent {
    async fn search(&self, query: &str) -> (String, Vec<ToolSnippet>) {
        let plan = plan_tools(&self.llm, &self.registry, query).await;

        // An empty recommendation means the planner judged the answer
        // internal; skip tools entirely.
        if plan.recommended_providers.is_empty() {
            return (String::new(), Vec::new());
        }

        let resolved = resolve_providers(
            &self.registry,
            self.prompt.as_ref(),
            &plan.recommended_providers,
            plan.category,
        );
        if resolved.ready.is_empty() {
            return (String::new(), Vec::new());
        }

        let snippets = self
            .executor
            .execute(&resolved.ready, query, plan.category)
            .await;
        (join_snippets(&snippets), snippets)
    }
}

impl std::fmt::Debug for ToolAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAgent")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Concatenates successful snippet texts into one block.
#[must_use]
pub fn join_snippets(snippets: &[ToolSnippet]) -> String {
    snippets
        .iter()
        .filter(|s| !s.error && !s.text.is_empty())
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCategory;

    #[test]
    fn test_join_snippets_skips_errors() {
        let snippets = vec![
            ToolSnippet::failure("serpapi", ToolCategory::Generic),
            ToolSnippet {
                tool: "serpapi".to_string(),
                category: ToolCategory::Generic,
                text: "Market cap $290B".to_string(),
                url: "https://example/q".to_string(),
                fetched_at: 0,
                error: false,
            },
        ];
        assert_eq!(join_snippets(&snippets), "Market cap $290B");
    }

    #[test]
    fn test_join_snippets_empty() {
        assert!(join_snippets(&[]).is_empty());
    }
}
