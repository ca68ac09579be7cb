//! Orchestrator for the research pipeline.
//!
//! Composes classifier → retriever → tool agent → synthesizer →
//! verifier into a single-query workflow with per-stage timeouts, a
//! global watchdog, and the streaming event contract: any number of
//! `log`/`token` events, at most one `error`, then exactly one `final`.
//! No failure mode (stage error, timeout, panic, empty evidence) may
//! escape without a `final` event.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::classifier;
use super::client::{LlmClient, join_stream_piece};
use super::config::QaConfig;
use super::provider::create_provider;
use super::events::{
    ExternalFact, InternalFact, MemoryFact, ProvenanceEntry, StreamEvent, TraceEvent, TraceStatus,
    WorkflowResult,
};
use super::reranker;
use super::retriever::{self, PartialAnswer};
use super::slots::{extract_missing_slots, is_incomplete};
use super::synthesizer::{self, strip_provenance_labels};
use super::verifier::{PARTIAL_EXTERNAL_COMPLETION, SourceWeights, verify};
use crate::core::chunking::{Chunk, chunk_with_pages};
use crate::core::pdf;
use crate::embedding::{Embedder, RemoteEmbedder};
use crate::error::QaError;
use crate::memory::{MemoryEntry, MemoryStore};
use crate::tools::registry::CredentialPrompt;
use crate::tools::{ExternalSearch, NoPrompt, ToolAgent, ToolRegistry, ToolSnippet};

/// Default chunks analyzed per query in streaming mode.
const DEFAULT_STREAM_MAX_CHUNKS: usize = 5;
/// Capacity of the stream event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;
/// Number of candidates generated when the reranker is enabled.
const RERANK_CANDIDATES: usize = 3;

/// Options for one streaming invocation.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Maximum chunks sent to the retriever agent.
    pub max_chunks: usize,
    /// Overall workflow budget.
    pub timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_chunks: DEFAULT_STREAM_MAX_CHUNKS,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Event sink shared by the blocking and streaming entry points.
///
/// In blocking mode no channel is attached and sends are no-ops. Send
/// failures (consumer dropped the stream) are ignored so cooperative
/// cancellation never turns into an error inside the pipeline.
#[derive(Clone)]
struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl EventSink {
    const fn null() -> Self {
        Self { tx: None }
    }

    const fn channel(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    const fn is_streaming(&self) -> bool {
        self.tx.is_some()
    }

    async fn log(&self, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx
                .send(StreamEvent::Log {
                    message: message.into(),
                })
                .await;
        }
    }

    async fn token(&self, text: String) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(StreamEvent::Token { text }).await;
        }
    }

    async fn error(&self, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx
                .send(StreamEvent::Error {
                    message: message.into(),
                })
                .await;
        }
    }
}

/// Per-stage completion flags. Each stage checks its predecessor so a
/// failed stage cannot silently enable a later one with missing inputs.
#[derive(Debug, Default, Clone, Copy)]
struct StageFlags {
    classifier_done: bool,
    retriever_done: bool,
    tool_done: bool,
    synth_done: bool,
    verifier_done: bool,
}

/// Single-query workflow coordinator.
#[derive(Clone)]
pub struct Orchestrator {
    llm: LlmClient,
    embedder: Arc<dyn Embedder>,
    memory: MemoryStore,
    external: Arc<dyn ExternalSearch>,
    config: QaConfig,
    weights: SourceWeights,
}

impl Orchestrator {
    /// Builds an orchestrator from configuration, wiring the OpenAI
    /// provider, remote embedder, and tool agent. Non-interactive:
    /// unconfigured tool providers are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`QaError`] when the provider cannot be created.
    pub fn from_config(config: QaConfig) -> Result<Self, QaError> {
        Self::from_config_with_prompt(config, Arc::new(NoPrompt))
    }

    /// Builds an orchestrator with an operator-facing credential prompt
    /// for the tool handshake.
    ///
    /// # Errors
    ///
    /// Returns [`QaError`] when the provider cannot be created.
    pub fn from_config_with_prompt(
        config: QaConfig,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> Result<Self, QaError> {
        let provider = create_provider(&config)?;
        let llm = LlmClient::new(provider, config.model_id.clone(), config.temperature);
        let embedder: Arc<dyn Embedder> = Arc::new(RemoteEmbedder::new(
            &config.api_key,
            config.base_url.as_deref(),
            config.embedding_model_id.clone(),
        ));
        let registry = ToolRegistry::load(&config.tool_config_path, &config.credentials_path);
        let external: Arc<dyn ExternalSearch> = Arc::new(ToolAgent::new(
            llm.clone(),
            registry,
            prompt,
            config.tool_call_timeout,
        ));
        let memory = MemoryStore::new(config.memory_dir.clone());

        Ok(Self {
            llm,
            embedder,
            memory,
            external,
            config,
            weights: SourceWeights::default(),
        })
    }

    /// Builds an orchestrator from explicit collaborators. This is the
    /// seam evaluation harnesses use to inject scripted providers.
    #[must_use]
    pub fn new(
        llm: LlmClient,
        embedder: Arc<dyn Embedder>,
        external: Arc<dyn ExternalSearch>,
        memory: MemoryStore,
        config: QaConfig,
    ) -> Self {
        Self {
            llm,
            embedder,
            memory,
            external,
            config,
            weights: SourceWeights::default(),
        }
    }

    /// Overrides the verifier's source quality weights.
    #[must_use]
    pub fn with_source_weights(mut self, weights: SourceWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Runs the workflow to completion and returns the result.
    ///
    /// Never fails: every internal error degrades to the failsafe
    /// result.
    pub async fn run(&self, query: &str, pdf_path: &Path) -> WorkflowResult {
        let opts = StreamOptions {
            max_chunks: DEFAULT_STREAM_MAX_CHUNKS,
            timeout: self.config.workflow_timeout,
        };
        let sink = EventSink::null();
        let outcome = AssertUnwindSafe(self.pipeline(query, pdf_path, &opts, &sink))
            .catch_unwind()
            .await;
        outcome.unwrap_or_else(|_| WorkflowResult::failsafe(Vec::new()))
    }

    /// Runs the workflow as an event stream.
    ///
    /// The pipeline executes in a spawned task feeding a bounded
    /// channel; dropping the returned stream cancels it cooperatively.
    /// The wrapper guarantees exactly one `final` event, last, even if
    /// the pipeline panics or produces nothing.
    #[must_use]
    pub fn run_stream(
        &self,
        query: &str,
        pdf_path: &Path,
        opts: StreamOptions,
    ) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let this = self.clone();
        let query = query.to_string();
        let pdf_path: PathBuf = pdf_path.to_path_buf();

        tokio::spawn(async move {
            let sink = EventSink::channel(tx.clone());
            let outcome = AssertUnwindSafe(this.pipeline(&query, &pdf_path, &opts, &sink))
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(result) => result,
                Err(_) => {
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: "Internal pipeline failure".to_string(),
                        })
                        .await;
                    WorkflowResult::failsafe(Vec::new())
                }
            };

            let _ = tx.send(StreamEvent::final_from(result)).await;
        });

        ReceiverStream::new(rx)
    }

    /// The pipeline body. Emits `log`/`token`/`error` events through the
    /// sink but never the terminal event; that is the callers' job, so
    /// "exactly one final" holds no matter how this function exits.
    #[allow(clippy::too_many_lines)]
    async fn pipeline(
        &self,
        query: &str,
        pdf_path: &Path,
        opts: &StreamOptions,
        sink: &EventSink,
    ) -> WorkflowResult {
        let started = Instant::now();
        let deadline = started + opts.timeout;
        let mut trace: Vec<TraceEvent> = Vec::new();
        let mut stages = StageFlags::default();

        sink.log("Reading document").await;
        let chunks = self.load_chunks(pdf_path);

        // Stage 1: classify. Local and deterministic; no timeout wrapper.
        let stage_start = Instant::now();
        let classification = classifier::classify(query, &chunks);
        stages.classifier_done = true;
        trace.push(TraceEvent::record(
            "classifier",
            TraceStatus::Ok,
            elapsed_ms(stage_start),
            Some(classification.reason.clone()),
        ));
        sink.log(format!(
            "Classifier: internal_sufficient={}, external_needed={}",
            classification.internal_sufficient, classification.external_needed
        ))
        .await;

        // Stage 2: retrieve partial answers under a stage timeout.
        let mut partials: Vec<PartialAnswer> = Vec::new();
        if stages.classifier_done {
            let budget = remaining(deadline).min(self.config.retriever_timeout);
            let stage_start = Instant::now();
            if budget.is_zero() {
                let message = QaError::Timeout { stage: "retriever" }.to_string();
                sink.error(&message).await;
                trace.push(TraceEvent::record(
                    "retriever",
                    TraceStatus::Error,
                    0,
                    Some(message),
                ));
            } else {
                sink.log("Retrieving evidence from document").await;
                match tokio::time::timeout(
                    budget,
                    retriever::retrieve(
                        &self.llm,
                        self.embedder.as_ref(),
                        query,
                        &chunks,
                        opts.max_chunks,
                    ),
                )
                .await
                {
                    Ok(found) => {
                        stages.retriever_done = true;
                        trace.push(TraceEvent::record(
                            "retriever",
                            TraceStatus::Ok,
                            elapsed_ms(stage_start),
                            Some(format!("{} partial answer(s)", found.len())),
                        ));
                        partials = found;
                    }
                    Err(_) => {
                        let message = QaError::Timeout { stage: "retriever" }.to_string();
                        sink.error(&message).await;
                        trace.push(TraceEvent::record(
                            "retriever",
                            TraceStatus::Error,
                            elapsed_ms(stage_start),
                            Some(message),
                        ));
                    }
                }
            }
        }

        let internal_facts: Vec<InternalFact> = partials
            .iter()
            .map(|p| InternalFact {
                text: p.text.clone(),
                page: p.page,
                similarity: Some(p.similarity),
            })
            .collect();

        // Stage 3: plan & execute external tools (primary path).
        let mut external_snippets: Vec<ToolSnippet> = Vec::new();
        if stages.classifier_done && self.config.enable_tool_agent && classification.external_needed
        {
            let budget = remaining(deadline).min(self.config.tool_stage_timeout);
            let stage_start = Instant::now();
            if budget.is_zero() {
                let message = QaError::Timeout { stage: "tools" }.to_string();
                sink.error(&message).await;
                trace.push(TraceEvent::record(
                    "tool_agent",
                    TraceStatus::Error,
                    0,
                    Some(message),
                ));
            } else {
                sink.log("Fetching external data").await;
                match tokio::time::timeout(budget, self.external.search(query)).await {
                    Ok((_, snippets)) => {
                        stages.tool_done = true;
                        trace.push(TraceEvent::record(
                            "tool_agent",
                            TraceStatus::Ok,
                            elapsed_ms(stage_start),
                            Some(format!("{} snippet(s)", snippets.len())),
                        ));
                        external_snippets = snippets;
                    }
                    Err(_) => {
                        let message = QaError::Timeout { stage: "tools" }.to_string();
                        sink.error(&message).await;
                        trace.push(TraceEvent::record(
                            "tool_agent",
                            TraceStatus::Error,
                            elapsed_ms(stage_start),
                            Some(message),
                        ));
                    }
                }
            }
        } else {
            stages.tool_done = true;
            trace.push(TraceEvent::record(
                "tool_agent",
                TraceStatus::Skipped,
                0,
                None,
            ));
        }

        let mut external_facts: Vec<ExternalFact> = facts_from_snippets(&external_snippets);

        // Stage 4: partial external completion. Independent of the
        // classifier's routing: a document that answers X but not Y
        // still gets Y from outside.
        let mut partial_completion = false;
        if self.config.enable_tool_agent
            && stages.retriever_done
            && !internal_facts.is_empty()
            && !remaining(deadline).is_zero()
            && is_incomplete(query, &internal_facts)
        {
            let missing = extract_missing_slots(query, &internal_facts);
            partial_completion = true;
            sink.log(format!("Completing missing fields: {}", missing.join(", ")))
                .await;
            let targeted = format!("{} {}", missing.join(" "), query);
            let budget = remaining(deadline).min(self.config.tool_stage_timeout);
            let stage_start = Instant::now();
            match tokio::time::timeout(budget, self.external.search(&targeted)).await {
                Ok((_, snippets)) => {
                    trace.push(TraceEvent::record(
                        "partial_completion",
                        TraceStatus::Ok,
                        elapsed_ms(stage_start),
                        Some(format!("missing: {}", missing.join(", "))),
                    ));
                    external_facts.extend(facts_from_snippets(&snippets));
                    external_snippets.extend(snippets);
                }
                Err(_) => {
                    let message = QaError::Timeout { stage: "tools" }.to_string();
                    sink.error(&message).await;
                    trace.push(TraceEvent::record(
                        "partial_completion",
                        TraceStatus::Error,
                        elapsed_ms(stage_start),
                        Some(message),
                    ));
                }
            }
        }

        // Stage 5: memory recall.
        let stage_start = Instant::now();
        let memory_entries = self.memory.load(pdf_path);
        let recalled = self
            .memory
            .find_relevant(
                self.embedder.as_ref(),
                query,
                &memory_entries,
                self.config.max_memory_to_load,
            )
            .await;
        let memory_facts: Vec<MemoryFact> = recalled
            .iter()
            .map(|r| MemoryFact {
                text: format!("Q: {}\nA: {}", r.entry.question, r.entry.answer),
                timestamp: r.entry.timestamp,
            })
            .collect();
        trace.push(TraceEvent::record(
            "memory",
            TraceStatus::Ok,
            elapsed_ms(stage_start),
            Some(format!("{} recalled", memory_facts.len())),
        ));

        // Stage 6: synthesize.
        let has_evidence =
            !internal_facts.is_empty() || !external_facts.is_empty() || !memory_facts.is_empty();

        let mut answer = String::new();
        if has_evidence {
            let budget = remaining(deadline);
            let stage_start = Instant::now();
            if budget.is_zero() {
                let message = QaError::Timeout { stage: "synthesizer" }.to_string();
                sink.error(&message).await;
                trace.push(TraceEvent::record(
                    "synthesizer",
                    TraceStatus::Error,
                    0,
                    Some(message),
                ));
            } else {
                sink.log("Synthesizing answer").await;
                answer = self
                    .synthesize_stage(
                        query,
                        pdf_path,
                        &internal_facts,
                        &external_facts,
                        &memory_facts,
                        &partials,
                        &external_snippets,
                        budget,
                        sink,
                    )
                    .await;
                let status = if answer.trim().is_empty() {
                    TraceStatus::Error
                } else {
                    stages.synth_done = true;
                    TraceStatus::Ok
                };
                trace.push(TraceEvent::record(
                    "synthesizer",
                    status,
                    elapsed_ms(stage_start),
                    None,
                ));
            }
        }

        if !stages.synth_done {
            // No usable evidence or synthesis produced nothing: emit the
            // failsafe result, still recording the attempt in memory.
            let result = WorkflowResult::failsafe(trace);
            self.persist(query, pdf_path, &result).await;
            return result;
        }

        // Stage 7: provenance, derived solely from the fact lists, one
        // entry per fact in order. Memory facts are context, not
        // citeable sources.
        let source = std::path::absolute(pdf_path)
            .unwrap_or_else(|_| pdf_path.to_path_buf())
            .to_string_lossy()
            .to_string();
        let mut provenance: Vec<ProvenanceEntry> = internal_facts
            .iter()
            .map(|f| ProvenanceEntry::internal(&source, f))
            .collect();
        provenance.extend(external_facts.iter().map(ProvenanceEntry::external));

        // Stage 8: verify.
        let stage_start = Instant::now();
        let mut verification = verify(
            &answer,
            &provenance,
            &partials,
            &external_snippets,
            &self.weights,
        );
        if partial_completion && !internal_facts.is_empty() && !external_facts.is_empty() {
            verification
                .flags
                .push(PARTIAL_EXTERNAL_COMPLETION.to_string());
        }
        stages.verifier_done = true;
        trace.push(TraceEvent::record(
            "verifier",
            TraceStatus::Ok,
            elapsed_ms(stage_start),
            Some(verification.explanation.clone()),
        ));

        let result = WorkflowResult {
            answer,
            confidence: verification.confidence,
            flags: verification.flags,
            provenance,
            trace,
        };

        // Stage 9: persist. Appended even for degraded results so the
        // audit trail is complete.
        if stages.verifier_done {
            self.persist(query, pdf_path, &result).await;
        }

        result
    }

    /// Runs synthesis in the mode the sink calls for: reranked
    /// multi-candidate, token-streamed, or single blocking call.
    #[allow(clippy::too_many_arguments)]
    async fn synthesize_stage(
        &self,
        query: &str,
        pdf_path: &Path,
        internal_facts: &[InternalFact],
        external_facts: &[ExternalFact],
        memory_facts: &[MemoryFact],
        partials: &[PartialAnswer],
        external_snippets: &[ToolSnippet],
        budget: Duration,
        sink: &EventSink,
    ) -> String {
        if self.config.enable_reranker {
            let source = std::path::absolute(pdf_path)
                .unwrap_or_else(|_| pdf_path.to_path_buf())
                .to_string_lossy()
                .to_string();
            let candidate_provenance: Vec<ProvenanceEntry> = internal_facts
                .iter()
                .map(|f| ProvenanceEntry::internal(&source, f))
                .chain(external_facts.iter().map(ProvenanceEntry::external))
                .collect();

            let ranked = tokio::time::timeout(budget, async {
                let candidates = reranker::generate_candidates(
                    &self.llm,
                    internal_facts,
                    external_facts,
                    memory_facts,
                    query,
                    RERANK_CANDIDATES,
                )
                .await;
                reranker::rank(
                    self.embedder.as_ref(),
                    query,
                    &candidates,
                    &candidate_provenance,
                    partials,
                    external_snippets,
                    &self.weights,
                )
                .await
            })
            .await;
            return ranked.ok().flatten().unwrap_or_default();
        }

        if sink.is_streaming() {
            let mut accumulated = String::new();
            let consumed = tokio::time::timeout(budget, async {
                let mut stream = synthesizer::synthesize_stream(
                    &self.llm,
                    internal_facts,
                    external_facts,
                    memory_facts,
                    query,
                )
                .await;
                while let Some(piece) = stream.next().await {
                    sink.token(piece.clone()).await;
                    join_stream_piece(&mut accumulated, &piece);
                }
            })
            .await;
            if consumed.is_err() {
                sink.error(QaError::Timeout { stage: "synthesizer" }.to_string())
                    .await;
            }
            return strip_provenance_labels(&accumulated);
        }

        tokio::time::timeout(
            budget,
            synthesizer::synthesize(
                &self.llm,
                internal_facts,
                external_facts,
                memory_facts,
                query,
                None,
            ),
        )
        .await
        .unwrap_or_default()
    }

    /// Loads and chunks the document, degrading to zero chunks on any
    /// extraction failure.
    fn load_chunks(&self, pdf_path: &Path) -> Vec<Chunk> {
        let pages = match pdf::extract_pages(pdf_path, self.config.max_pages) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::debug!(path = %pdf_path.display(), error = %e, "PDF extraction failed");
                Vec::new()
            }
        };
        chunk_with_pages(
            &pages,
            self.config.chunk_size,
            self.config.chunk_overlap,
            self.config.max_chunks,
        )
    }

    /// Appends the Q&A to the document's memory file.
    async fn persist(&self, query: &str, pdf_path: &Path, result: &WorkflowResult) {
        if !self.config.save_memory {
            return;
        }

        let embedding = self.embedder.embed(&result.answer).await;
        let entry = MemoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            question: query.to_string(),
            answer: result.answer.clone(),
            confidence: result.confidence,
            flags: result.flags.clone(),
            provenance: result.provenance.clone(),
            embedding,
            model_id: self.llm.model().to_string(),
        };

        if let Err(e) = self.memory.append(pdf_path, entry) {
            tracing::warn!(error = %e, "memory append failed");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("llm", &self.llm)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Builds external facts from successful snippets; error snippets carry
/// no content worth citing.
fn facts_from_snippets(snippets: &[ToolSnippet]) -> Vec<ExternalFact> {
    snippets
        .iter()
        .filter(|s| !s.error && !s.text.is_empty())
        .map(|s| ExternalFact {
            text: s.text.clone(),
            url: s.url.clone(),
            tool: s.tool.clone(),
            category: s.category,
        })
        .collect()
}
