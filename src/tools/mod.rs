//! External knowledge tools: categories, providers, planning, execution.
//!
//! Two layers are kept distinct. *Conceptual tools* are categories of
//! external knowledge the planner can recommend whether or not anything
//! is configured. *Configured providers* are concrete data sources from
//! `tool_config.json` with endpoints and credentials; only these can be
//! executed.

pub mod agent;
pub mod executor;
pub mod planner;
pub mod registry;

use serde::{Deserialize, Serialize};

pub use agent::{ExternalSearch, ToolAgent};
pub use executor::ToolExecutor;
pub use planner::{ToolPlan, plan_tools};
pub use registry::{
    CredentialPrompt, NoPrompt, ProviderConfig, ResolvedProviders, ToolRegistry,
};

/// Knowledge category of an external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// General-purpose web search.
    Generic,
    /// Official filings and disclosures.
    Regulatory,
    /// Company metrics, balance sheets, ratios.
    Financials,
    /// Real-time and historical market prices.
    Market,
    /// GDP, inflation, policy rates.
    Macro,
    /// Issuer credit ratings.
    Credit,
    /// Market and company news.
    News,
}

impl ToolCategory {
    /// Parses a category string (case-insensitive). Unknown values map
    /// to [`ToolCategory::Generic`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "regulatory" => Self::Regulatory,
            "financials" => Self::Financials,
            "market" => Self::Market,
            "macro" => Self::Macro,
            "credit" => Self::Credit,
            "news" => Self::News,
            _ => Self::Generic,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Regulatory => "regulatory",
            Self::Financials => "financials",
            Self::Market => "market",
            Self::Macro => "macro",
            Self::Credit => "credit",
            Self::News => "news",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conceptual tool: a category of external knowledge the planner may
/// recommend, independent of configuration.
#[derive(Debug, Clone)]
pub struct ConceptualTool {
    /// Stable key (e.g. `"regulatory_filings"`).
    pub key: &'static str,
    /// Knowledge category.
    pub category: ToolCategory,
    /// What the tool is for.
    pub purpose: &'static str,
    /// Example real-world providers.
    pub example_providers: &'static [&'static str],
}

/// The static catalog of conceptual tools for investment research.
#[must_use]
pub fn knowledge_base() -> Vec<ConceptualTool> {
    vec![
        ConceptualTool {
            key: "web_search",
            category: ToolCategory::Generic,
            purpose: "Search authoritative websites for latest info",
            example_providers: &["SerpAPI", "Bing API", "DuckDuckGo"],
        },
        ConceptualTool {
            key: "regulatory_filings",
            category: ToolCategory::Regulatory,
            purpose: "Fetch official filings and disclosures",
            example_providers: &["SEC EDGAR", "SEBI", "Companies House"],
        },
        ConceptualTool {
            key: "company_financials",
            category: ToolCategory::Financials,
            purpose: "Company metrics, balance sheets, ratios",
            example_providers: &["Yahoo Finance", "Alpha Vantage"],
        },
        ConceptualTool {
            key: "market_prices",
            category: ToolCategory::Market,
            purpose: "Real-time and historical market prices",
            example_providers: &["Yahoo Finance", "Alpha Vantage", "NSE", "BSE"],
        },
        ConceptualTool {
            key: "macroeconomic",
            category: ToolCategory::Macro,
            purpose: "GDP, inflation, policy rates",
            example_providers: &["World Bank", "IMF", "RBI"],
        },
        ConceptualTool {
            key: "credit_ratings",
            category: ToolCategory::Credit,
            purpose: "Issuer credit ratings",
            example_providers: &["Moody's", "S&P"],
        },
        ConceptualTool {
            key: "financial_news",
            category: ToolCategory::News,
            purpose: "Market and company news",
            example_providers: &["Reuters", "Bloomberg"],
        },
    ]
}

/// Normalized output of a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSnippet {
    /// Provider id that produced the snippet.
    pub tool: String,
    /// Knowledge category of the provider.
    pub category: ToolCategory,
    /// Snippet text.
    pub text: String,
    /// Source URL (empty on failure).
    pub url: String,
    /// Epoch seconds when the snippet was fetched.
    pub fetched_at: i64,
    /// Set when the call failed; the snippet then carries a fixed
    /// failure message instead of content.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl ToolSnippet {
    /// Failure text carried by error snippets.
    pub const FAILURE_TEXT: &'static str = "Tool failed or unavailable";

    /// Builds a structured error snippet for a failed provider call.
    #[must_use]
    pub fn failure(tool: &str, category: ToolCategory) -> Self {
        Self {
            tool: tool.to_string(),
            category,
            text: Self::FAILURE_TEXT.to_string(),
            url: String::new(),
            fetched_at: chrono::Utc::now().timestamp(),
            error: true,
        }
    }
}
