//! Shared test harness: scripted LLM provider, stubbed external search,
//! and a minimal PDF writer.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use bfsiqa::agent::provider::CompletionStream;
use bfsiqa::agent::{ChatRequest, ChatResponse, LlmClient, LlmProvider, Role, TokenUsage};
use bfsiqa::embedding::NullEmbedder;
use bfsiqa::error::QaError;
use bfsiqa::memory::MemoryStore;
use bfsiqa::tools::{ExternalSearch, ToolCategory, ToolSnippet};
use bfsiqa::{Orchestrator, QaConfig};

/// Deterministic extractive provider.
///
/// Chunk-analysis prompts echo the chunk text back; synthesis prompts
/// join the bulleted fact lines. An optional delay simulates a slow
/// model for timeout tests.
pub struct StubProvider {
    pub delay: Duration,
    synthesis_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            synthesis_calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            synthesis_calls: AtomicUsize::new(0),
        }
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesis_calls.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &ChatRequest) -> String {
        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if prompt.contains("CHUNK") && prompt.contains("QUESTION:") {
            return extract_chunk_body(prompt);
        }

        if prompt.contains("INTERNAL FACTS:") {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            return join_fact_bullets(prompt);
        }

        if prompt.contains("Output only valid JSON") {
            return r#"{"category": "generic", "recommended_providers": ["web_search_generic"], "reason": "stub"}"#.to_string();
        }

        String::new()
    }
}

fn extract_chunk_body(prompt: &str) -> String {
    let start = prompt
        .find("CHUNK")
        .and_then(|i| prompt[i..].find(":\n").map(|j| i + j + 2))
        .unwrap_or(0);
    let end = prompt.find("\n\nQUESTION:").unwrap_or(prompt.len());
    prompt[start..end].trim().to_string()
}

fn join_fact_bullets(prompt: &str) -> String {
    let body = prompt.split("QUESTION:").next().unwrap_or_default();
    body.lines()
        .filter_map(|l| l.strip_prefix("- "))
        .filter(|l| *l != "(none)")
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, QaError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ChatResponse {
            content: self.respond(request),
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<CompletionStream, QaError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let content = self.respond(request);
        let pieces: Vec<Result<String, QaError>> = content
            .split_inclusive(' ')
            .map(|p| Ok(p.to_string()))
            .collect();
        Ok(Box::pin(futures_util::stream::iter(pieces)))
    }
}

/// External search stub returning a fixed snippet list.
pub struct StubSearch {
    pub snippets: Vec<ToolSnippet>,
}

impl StubSearch {
    pub fn returning(text: &str, url: &str) -> Self {
        Self {
            snippets: vec![ToolSnippet {
                tool: "serpapi".to_string(),
                category: ToolCategory::Generic,
                text: text.to_string(),
                url: url.to_string(),
                fetched_at: 1_700_000_000,
                error: false,
            }],
        }
    }

    pub fn empty() -> Self {
        Self {
            snippets: Vec::new(),
        }
    }
}

#[async_trait]
impl ExternalSearch for StubSearch {
    async fn search(&self, _query: &str) -> (String, Vec<ToolSnippet>) {
        let joined = self
            .snippets
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        (joined, self.snippets.clone())
    }
}

/// Writes a one-page PDF whose page contains `text`.
pub fn write_pdf(path: &Path, text: &str) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save pdf");
}

/// Builds an orchestrator over the stub provider, a null embedder, and
/// the given external search, with memory rooted in `memory_dir`.
pub fn build_orchestrator(
    provider: Arc<StubProvider>,
    external: Arc<dyn ExternalSearch>,
    memory_dir: &Path,
    enable_tools: bool,
) -> Orchestrator {
    let config = QaConfig::builder()
        .api_key("test")
        .memory_dir(memory_dir)
        .enable_tool_agent(enable_tools)
        .build()
        .expect("config");

    let llm = LlmClient::new(provider, "stub-model", 0.0);
    Orchestrator::new(
        llm,
        Arc::new(NullEmbedder),
        external,
        MemoryStore::new(memory_dir),
        config,
    )
}
