//! Pipeline configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::QaError;

/// Default chat model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.2;
/// Default pages extracted per PDF.
const DEFAULT_MAX_PAGES: usize = 20;
/// Default chunk window size in characters.
const DEFAULT_CHUNK_SIZE: usize = 1200;
/// Default chunk overlap in characters.
const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Safety cap on chunks per document.
const DEFAULT_MAX_CHUNKS: usize = 60;
/// Default prior-memory entries included in synthesis.
const DEFAULT_MAX_MEMORY_TO_LOAD: usize = 5;
/// Default overall workflow budget in seconds.
const DEFAULT_WORKFLOW_TIMEOUT_SECS: u64 = 30;
/// Default retriever stage cap in streaming mode, in seconds.
const DEFAULT_RETRIEVER_TIMEOUT_SECS: u64 = 45;
/// Hard per-request timeout for external tool calls, in seconds.
const DEFAULT_TOOL_CALL_TIMEOUT_SECS: u64 = 10;
/// Aggregate budget for the tool execution stage, in seconds.
const DEFAULT_TOOL_STAGE_TIMEOUT_SECS: u64 = 15;

/// Configuration for the research pipeline.
#[derive(Debug, Clone)]
pub struct QaConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Chat model id.
    pub model_id: String,
    /// Embedding model id.
    pub embedding_model_id: String,
    /// Sampling temperature for agent calls.
    pub temperature: f32,
    /// Maximum pages extracted per PDF.
    pub max_pages: usize,
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Chunk overlap in characters.
    pub chunk_overlap: usize,
    /// Safety cap on chunks per document.
    pub max_chunks: usize,
    /// Top-N prior memory entries included in synthesis.
    pub max_memory_to_load: usize,
    /// Whether to persist Q&A records after each query.
    pub save_memory: bool,
    /// Whether tool planning and execution are enabled.
    pub enable_tool_agent: bool,
    /// Whether multi-candidate synthesis is enabled.
    pub enable_reranker: bool,
    /// Verbose trace logging.
    pub debug: bool,
    /// Directory holding per-document memory files.
    pub memory_dir: PathBuf,
    /// Path to the tool provider configuration file.
    pub tool_config_path: PathBuf,
    /// Path to the credentials file. Never committed.
    pub credentials_path: PathBuf,
    /// Overall workflow budget.
    pub workflow_timeout: Duration,
    /// Retriever stage cap in streaming mode.
    pub retriever_timeout: Duration,
    /// Hard per-request timeout for external tool calls.
    pub tool_call_timeout: Duration,
    /// Aggregate budget for the tool execution stage.
    pub tool_stage_timeout: Duration,
}

impl QaConfig {
    /// Creates a new builder for `QaConfig`.
    #[must_use]
    pub fn builder() -> QaConfigBuilder {
        QaConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, QaError> {
        Self::builder().from_env().build()
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Builder for [`QaConfig`].
#[derive(Debug, Clone, Default)]
pub struct QaConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model_id: Option<String>,
    embedding_model_id: Option<String>,
    temperature: Option<f32>,
    max_pages: Option<usize>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    max_chunks: Option<usize>,
    max_memory_to_load: Option<usize>,
    save_memory: Option<bool>,
    enable_tool_agent: Option<bool>,
    enable_reranker: Option<bool>,
    debug: Option<bool>,
    memory_dir: Option<PathBuf>,
    tool_config_path: Option<PathBuf>,
    credentials_path: Option<PathBuf>,
    workflow_timeout: Option<Duration>,
    retriever_timeout: Option<Duration>,
    tool_call_timeout: Option<Duration>,
    tool_stage_timeout: Option<Duration>,
}

impl QaConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("QA_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("QA_BASE_URL"))
                .ok();
        }
        if self.model_id.is_none() {
            self.model_id = std::env::var("MODEL_ID").ok();
        }
        if self.embedding_model_id.is_none() {
            self.embedding_model_id = std::env::var("EMBEDDING_MODEL_ID").ok();
        }
        if self.max_pages.is_none() {
            self.max_pages = env_parse("MAX_PAGES");
        }
        if self.chunk_size.is_none() {
            self.chunk_size = env_parse("CHUNK_SIZE");
        }
        if self.chunk_overlap.is_none() {
            self.chunk_overlap = env_parse("CHUNK_OVERLAP");
        }
        if self.max_chunks.is_none() {
            self.max_chunks = env_parse("MAX_CHUNKS");
        }
        if self.max_memory_to_load.is_none() {
            self.max_memory_to_load = env_parse("MAX_MEMORY_TO_LOAD");
        }
        if self.save_memory.is_none() {
            self.save_memory = std::env::var("SAVE_MEMORY").ok().map(|v| v != "0");
        }
        if self.enable_tool_agent.is_none() {
            self.enable_tool_agent = env_flag("ENABLE_TOOL_AGENT");
        }
        if self.enable_reranker.is_none() {
            self.enable_reranker = env_flag("ENABLE_RERANKER");
        }
        if self.debug.is_none() {
            self.debug = env_flag("DEBUG");
        }
        if self.memory_dir.is_none() {
            self.memory_dir = std::env::var("MEMORY_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the chat model id.
    #[must_use]
    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.model_id = Some(model.into());
        self
    }

    /// Sets the embedding model id.
    #[must_use]
    pub fn embedding_model_id(mut self, model: impl Into<String>) -> Self {
        self.embedding_model_id = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the maximum pages extracted per PDF.
    #[must_use]
    pub const fn max_pages(mut self, n: usize) -> Self {
        self.max_pages = Some(n);
        self
    }

    /// Sets the chunk window size.
    #[must_use]
    pub const fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Sets the chunk overlap.
    #[must_use]
    pub const fn chunk_overlap(mut self, n: usize) -> Self {
        self.chunk_overlap = Some(n);
        self
    }

    /// Sets the chunk count cap.
    #[must_use]
    pub const fn max_chunks(mut self, n: usize) -> Self {
        self.max_chunks = Some(n);
        self
    }

    /// Sets the top-N memory entries included in synthesis.
    #[must_use]
    pub const fn max_memory_to_load(mut self, n: usize) -> Self {
        self.max_memory_to_load = Some(n);
        self
    }

    /// Sets whether Q&A records are persisted.
    #[must_use]
    pub const fn save_memory(mut self, on: bool) -> Self {
        self.save_memory = Some(on);
        self
    }

    /// Enables or disables tool planning and execution.
    #[must_use]
    pub const fn enable_tool_agent(mut self, on: bool) -> Self {
        self.enable_tool_agent = Some(on);
        self
    }

    /// Enables or disables multi-candidate synthesis.
    #[must_use]
    pub const fn enable_reranker(mut self, on: bool) -> Self {
        self.enable_reranker = Some(on);
        self
    }

    /// Enables verbose trace logging.
    #[must_use]
    pub const fn debug(mut self, on: bool) -> Self {
        self.debug = Some(on);
        self
    }

    /// Sets the memory directory.
    #[must_use]
    pub fn memory_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.memory_dir = Some(dir.into());
        self
    }

    /// Sets the tool configuration file path.
    #[must_use]
    pub fn tool_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_config_path = Some(path.into());
        self
    }

    /// Sets the credentials file path.
    #[must_use]
    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Sets the overall workflow budget.
    #[must_use]
    pub const fn workflow_timeout(mut self, d: Duration) -> Self {
        self.workflow_timeout = Some(d);
        self
    }

    /// Sets the retriever stage cap.
    #[must_use]
    pub const fn retriever_timeout(mut self, d: Duration) -> Self {
        self.retriever_timeout = Some(d);
        self
    }

    /// Builds the [`QaConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`QaError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<QaConfig, QaError> {
        let api_key = self.api_key.ok_or(QaError::ApiKeyMissing)?;

        Ok(QaConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model_id: self.model_id.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            embedding_model_id: self
                .embedding_model_id
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_pages: self.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            chunk_overlap: self.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            max_chunks: self.max_chunks.unwrap_or(DEFAULT_MAX_CHUNKS),
            max_memory_to_load: self
                .max_memory_to_load
                .unwrap_or(DEFAULT_MAX_MEMORY_TO_LOAD),
            save_memory: self.save_memory.unwrap_or(true),
            enable_tool_agent: self.enable_tool_agent.unwrap_or(false),
            enable_reranker: self.enable_reranker.unwrap_or(false),
            debug: self.debug.unwrap_or(false),
            memory_dir: self.memory_dir.unwrap_or_else(|| PathBuf::from("memories")),
            tool_config_path: self
                .tool_config_path
                .unwrap_or_else(|| PathBuf::from("tool_config.json")),
            credentials_path: self
                .credentials_path
                .unwrap_or_else(|| PathBuf::from(".tool_credentials.json")),
            workflow_timeout: self
                .workflow_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_WORKFLOW_TIMEOUT_SECS)),
            retriever_timeout: self
                .retriever_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_RETRIEVER_TIMEOUT_SECS)),
            tool_call_timeout: self
                .tool_call_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TOOL_CALL_TIMEOUT_SECS)),
            tool_stage_timeout: self
                .tool_stage_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TOOL_STAGE_TIMEOUT_SECS)),
        })
    }
}
