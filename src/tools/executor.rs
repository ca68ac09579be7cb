//! Tool executor: invokes ready providers with hard timeouts.
//!
//! Dispatch is by category: generic providers go through SerpAPI with a
//! DuckDuckGo HTML-scrape fallback; everything else is driven by the
//! provider's endpoint template. Every failure becomes a structured
//! error snippet, never an error; the pipeline must not be able to die
//! inside a tool call.

use std::time::Duration;

use scraper::{Html, Selector};

use super::registry::{GENERIC_PROVIDER, ToolRegistry};
use super::{ToolCategory, ToolSnippet};
use crate::error::QaError;

/// Maximum snippets returned per provider.
const MAX_SNIPPETS_PER_PROVIDER: usize = 5;
/// Maximum characters kept from a raw provider response body.
const MAX_RESPONSE_TEXT: usize = 4000;
/// User agent presented to external services.
const USER_AGENT: &str = "bfsiqa/0.1";

/// Executes external tool calls against configured providers.
pub struct ToolExecutor {
    http: reqwest::Client,
    registry: ToolRegistry,
}

impl ToolExecutor {
    /// Creates an executor with the given per-request timeout.
    #[must_use]
    pub fn new(registry: ToolRegistry, call_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(call_timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { http, registry }
    }

    /// Invokes each ready provider in order, stopping after the first
    /// provider that returns usable snippets. Failed providers
    /// contribute structured error snippets. When every provider fails,
    /// a final generic-search attempt is made so the query still gets a
    /// chance at external evidence.
    pub async fn execute(
        &self,
        ready_providers: &[String],
        query: &str,
        category: ToolCategory,
    ) -> Vec<ToolSnippet> {
        let mut results: Vec<ToolSnippet> = Vec::new();

        for provider in ready_providers {
            let provider_category = self
                .registry
                .get(provider)
                .map_or(category, |c| c.category);

            match self.call_provider(provider, provider_category, query).await {
                Ok(snippets) if !snippets.is_empty() => {
                    tracing::debug!(provider = %provider, count = snippets.len(), "external snippets");
                    results.extend(snippets);
                    break;
                }
                Ok(_) => {
                    results.push(ToolSnippet::failure(provider, provider_category));
                }
                Err(e) => {
                    tracing::debug!(provider = %provider, error = %e, "provider call failed");
                    results.push(ToolSnippet::failure(provider, provider_category));
                }
            }
        }

        let all_failed = results.iter().all(|s| s.error);
        if all_failed && !ready_providers.iter().any(|p| p == GENERIC_PROVIDER) {
            match self.generic_search(GENERIC_PROVIDER, query).await {
                Ok(snippets) if !snippets.is_empty() => results = snippets,
                _ => {
                    if results.is_empty() {
                        results.push(ToolSnippet::failure(GENERIC_PROVIDER, ToolCategory::Generic));
                    }
                }
            }
        }

        results
    }

    async fn call_provider(
        &self,
        provider: &str,
        category: ToolCategory,
        query: &str,
    ) -> Result<Vec<ToolSnippet>, QaError> {
        if category == ToolCategory::Generic || provider == GENERIC_PROVIDER {
            return self.generic_search(provider, query).await;
        }

        let config = self
            .registry
            .get(provider)
            .ok_or_else(|| QaError::ToolExecution {
                name: provider.to_string(),
                message: "provider not configured".to_string(),
            })?;

        if config.endpoint_template.is_empty() {
            return Err(QaError::ToolExecution {
                name: provider.to_string(),
                message: "provider has no endpoint template".to_string(),
            });
        }

        let credentials = self
            .registry
            .resolve_credentials(provider, &config.required_fields)
            .ok_or_else(|| QaError::ToolExecution {
                name: provider.to_string(),
                message: format!("missing credentials: {:?}", config.required_fields),
            })?;

        let mut endpoint = config
            .endpoint_template
            .replace("{q}", &url_encode(query));
        for (field, value) in &credentials {
            endpoint = endpoint.replace(&format!("{{{field}}}"), value);
        }

        let raw = self.fetch_text(&endpoint, provider).await?;
        Ok(parse_generic_response(&raw, &endpoint, provider, category))
    }

    /// Generic search: SerpAPI when configured with credentials,
    /// otherwise (or on empty results) a DuckDuckGo HTML scrape.
    async fn generic_search(
        &self,
        provider: &str,
        query: &str,
    ) -> Result<Vec<ToolSnippet>, QaError> {
        if self.registry.get("serpapi").is_some() {
            if let Some(creds) = self
                .registry
                .resolve_credentials("serpapi", &["api_key".to_string()])
            {
                let api_key = creds.get("api_key").cloned().unwrap_or_default();
                match self.serpapi_search(query, &api_key).await {
                    Ok(snippets) if !snippets.is_empty() => return Ok(snippets),
                    Ok(_) | Err(_) => {
                        tracing::debug!("SerpAPI empty or failed, scraping DuckDuckGo");
                    }
                }
            }
        }
        self.duckduckgo_scrape(provider, query).await
    }

    async fn serpapi_search(&self, query: &str, api_key: &str) -> Result<Vec<ToolSnippet>, QaError> {
        let response = self
            .http
            .get("https://serpapi.com/search.json")
            .query(&[("engine", "google"), ("q", query), ("api_key", api_key)])
            .send()
            .await
            .map_err(|e| tool_error("serpapi", &e.to_string()))?
            .error_for_status()
            .map_err(|e| tool_error("serpapi", &e.to_string()))?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| tool_error("serpapi", &e.to_string()))?;

        let now = chrono::Utc::now().timestamp();
        let snippets = data["organic_results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .take(MAX_SNIPPETS_PER_PROVIDER)
                    .filter_map(|r| {
                        let title = r["title"].as_str().unwrap_or_default();
                        let snippet = r["snippet"].as_str().unwrap_or_default();
                        let link = r["link"].as_str().unwrap_or_default();
                        let text = join_title_snippet(title, snippet);
                        (!text.is_empty()).then(|| ToolSnippet {
                            tool: "serpapi".to_string(),
                            category: ToolCategory::Generic,
                            text,
                            url: link.to_string(),
                            fetched_at: now,
                            error: false,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(snippets)
    }

    async fn duckduckgo_scrape(
        &self,
        provider: &str,
        query: &str,
    ) -> Result<Vec<ToolSnippet>, QaError> {
        let response = self
            .http
            .post("https://html.duckduckgo.com/html/")
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| tool_error(provider, &e.to_string()))?
            .error_for_status()
            .map_err(|e| tool_error(provider, &e.to_string()))?;

        let html = response
            .text()
            .await
            .map_err(|e| tool_error(provider, &e.to_string()))?;

        let fallback_url = format!("https://duckduckgo.com/?q={}", url_encode(query));
        Ok(parse_duckduckgo_results(&html, provider, &fallback_url))
    }

    async fn fetch_text(&self, url: &str, provider: &str) -> Result<String, QaError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| tool_error(provider, &e.to_string()))?
            .error_for_status()
            .map_err(|e| tool_error(provider, &e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| tool_error(provider, &e.to_string()))
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn tool_error(provider: &str, message: &str) -> QaError {
    QaError::ToolExecution {
        name: provider.to_string(),
        message: message.to_string(),
    }
}

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn join_title_snippet(title: &str, snippet: &str) -> String {
    match (title.is_empty(), snippet.is_empty()) {
        (false, false) => format!("{title}: {snippet}"),
        (false, true) => title.to_string(),
        (true, false) => snippet.to_string(),
        (true, true) => String::new(),
    }
}

/// Extracts result snippets from DuckDuckGo's HTML results page.
///
/// Sync on purpose: the parsed DOM is not `Send`, so it must not live
/// across an await point.
fn parse_duckduckgo_results(html: &str, provider: &str, fallback_url: &str) -> Vec<ToolSnippet> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(".result").unwrap_or_else(|_| unreachable!());
    let title_sel = Selector::parse(".result__title a").unwrap_or_else(|_| unreachable!());
    let snippet_sel = Selector::parse(".result__snippet").unwrap_or_else(|_| unreachable!());

    let now = chrono::Utc::now().timestamp();
    document
        .select(&result_sel)
        .take(MAX_SNIPPETS_PER_PROVIDER)
        .filter_map(|item| {
            let title_el = item.select(&title_sel).next();
            let title = title_el
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let snippet = item
                .select(&snippet_sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            let mut link = title_el
                .and_then(|el| el.value().attr("href"))
                .unwrap_or_default()
                .to_string();
            if link.starts_with("//") {
                link = format!("https:{link}");
            }
            if link.is_empty() {
                link = fallback_url.to_string();
            }

            let text = join_title_snippet(&title, &snippet);
            (!text.is_empty()).then(|| ToolSnippet {
                tool: provider.to_string(),
                category: ToolCategory::Generic,
                text,
                url: link,
                fetched_at: now,
                error: false,
            })
        })
        .collect()
}

/// Best-effort parse of an arbitrary provider response: JSON snippet
/// fields when present, otherwise the truncated raw body.
fn parse_generic_response(
    raw: &str,
    url: &str,
    provider: &str,
    category: ToolCategory,
) -> Vec<ToolSnippet> {
    let now = chrono::Utc::now().timestamp();
    let make = |text: String| ToolSnippet {
        tool: provider.to_string(),
        category,
        text,
        url: url.to_string(),
        fetched_at: now,
        error: false,
    };

    if let Ok(data) = serde_json::from_str::<serde_json::Value>(raw) {
        for key in ["snippet", "snippets", "results", "organic_results", "items"] {
            match &data[key] {
                serde_json::Value::Array(items) if !items.is_empty() => {
                    return items
                        .iter()
                        .take(MAX_SNIPPETS_PER_PROVIDER)
                        .map(|item| {
                            let text = item
                                .as_str()
                                .map_or_else(|| item.to_string(), ToString::to_string);
                            make(truncate(&text, MAX_RESPONSE_TEXT))
                        })
                        .collect();
                }
                serde_json::Value::String(s) if !s.is_empty() => {
                    return vec![make(truncate(s, MAX_RESPONSE_TEXT))];
                }
                _ => {}
            }
        }
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![make(truncate(trimmed, MAX_RESPONSE_TEXT))]
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
