//! Data types for evidence, provenance, traces, and stream events.
//!
//! Provenance is built by the orchestrator from the structured fact
//! lists, never by the model. The answer text and the provenance list are
//! kept epistemically separate all the way to the final event.

use serde::{Deserialize, Serialize};

use crate::tools::ToolCategory;

/// Maximum characters of evidence text carried by one provenance entry.
pub const PROVENANCE_TEXT_MAX: usize = 500;

/// Origin of a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Evidence from the document itself.
    Internal,
    /// Evidence from an external tool provider.
    External,
}

impl SourceKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

/// A fact extracted from the document, input to synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalFact {
    /// Fact text (a retriever partial answer).
    pub text: String,
    /// 1-based page, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Retrieval similarity, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// A fact obtained from an external tool provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalFact {
    /// Snippet text.
    pub text: String,
    /// Source URL.
    pub url: String,
    /// Provider id that produced the snippet.
    pub tool: String,
    /// Knowledge category of the provider.
    pub category: ToolCategory,
}

/// A prior Q&A recalled from memory, used as context only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    /// Prior question and answer text.
    pub text: String,
    /// Epoch seconds when the prior answer was recorded.
    pub timestamp: i64,
}

/// Authoritative attribution of one piece of evidence to its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// Evidence origin.
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Document absolute path or snippet URL. Never empty.
    pub source: String,
    /// 1-based page for internal evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Provider id for external evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Provider category for external evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ToolCategory>,
    /// Evidence text, truncated to [`PROVENANCE_TEXT_MAX`] characters.
    pub text: String,
    /// Retrieval similarity for internal evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl ProvenanceEntry {
    /// Builds an internal entry from a document fact.
    #[must_use]
    pub fn internal(source: &str, fact: &InternalFact) -> Self {
        Self {
            kind: SourceKind::Internal,
            source: source.to_string(),
            page: fact.page,
            tool: None,
            category: None,
            text: truncate_chars(&fact.text, PROVENANCE_TEXT_MAX),
            similarity: fact.similarity,
        }
    }

    /// Builds an external entry from a tool fact.
    #[must_use]
    pub fn external(fact: &ExternalFact) -> Self {
        Self {
            kind: SourceKind::External,
            source: fact.url.clone(),
            page: None,
            tool: Some(fact.tool.clone()),
            category: Some(fact.category),
            text: truncate_chars(&fact.text, PROVENANCE_TEXT_MAX),
            similarity: None,
        }
    }
}

/// Truncates a string to at most `max` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

/// Outcome of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    /// Stage completed.
    Ok,
    /// Stage failed or timed out.
    Error,
    /// Stage was not run.
    Skipped,
}

/// One entry of the per-query execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Stage name (e.g. `"classifier"`, `"retriever"`).
    pub agent: String,
    /// Stage outcome.
    pub status: TraceStatus,
    /// Wall time for the stage in milliseconds.
    pub latency_ms: u64,
    /// Epoch seconds when the stage finished.
    pub timestamp: i64,
    /// Optional stage-specific detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceEvent {
    /// Records a stage outcome stamped with the current time.
    #[must_use]
    pub fn record(agent: &str, status: TraceStatus, latency_ms: u64, detail: Option<String>) -> Self {
        Self {
            agent: agent.to_string(),
            status,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
            detail,
        }
    }
}

/// Complete result of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Final answer text. Contains no provenance labels.
    pub answer: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Quality flags.
    pub flags: Vec<String>,
    /// Evidence attribution, one entry per fact used in synthesis.
    pub provenance: Vec<ProvenanceEntry>,
    /// Per-stage execution trace.
    pub trace: Vec<TraceEvent>,
}

impl WorkflowResult {
    /// Answer emitted when no usable evidence was gathered.
    pub const FAILSAFE_ANSWER: &'static str =
        "System could not retrieve sufficient evidence for this query.";

    /// Builds the failsafe result carrying whatever trace exists.
    #[must_use]
    pub fn failsafe(trace: Vec<TraceEvent>) -> Self {
        Self {
            answer: Self::FAILSAFE_ANSWER.to_string(),
            confidence: 0.0,
            flags: Vec::new(),
            provenance: Vec::new(),
            trace,
        }
    }
}

/// One event of the streaming protocol.
///
/// Ordering contract: zero or more `log` events interleaved with zero or
/// more `token` events, optionally one `error`, then exactly one `final`.
/// Nothing follows `final`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Progress message for the consumer.
    Log {
        /// Human-readable progress text.
        message: String,
    },
    /// Incremental answer text.
    Token {
        /// Text piece; join with
        /// [`join_stream_piece`](crate::agent::client::join_stream_piece).
        text: String,
    },
    /// Recoverable failure notice; the stream still terminates normally.
    Error {
        /// Human-readable failure description naming the stage.
        message: String,
    },
    /// Terminal event carrying the complete result.
    Final {
        /// Final answer text.
        answer: String,
        /// Confidence in `[0, 1]`.
        confidence: f32,
        /// Quality flags.
        flags: Vec<String>,
        /// Evidence attribution.
        provenance: Vec<ProvenanceEntry>,
        /// Per-stage execution trace.
        trace: Vec<TraceEvent>,
    },
}

impl StreamEvent {
    /// Builds the terminal event from a workflow result.
    #[must_use]
    pub fn final_from(result: WorkflowResult) -> Self {
        Self::Final {
            answer: result.answer,
            confidence: result.confidence,
            flags: result.flags,
            provenance: result.provenance,
            trace: result.trace,
        }
    }

    /// Returns `true` for the terminal event.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_truncates_to_limit() {
        let fact = InternalFact {
            text: "x".repeat(600),
            page: Some(3),
            similarity: Some(0.8),
        };
        let entry = ProvenanceEntry::internal("/tmp/report.pdf", &fact);
        assert_eq!(entry.text.chars().count(), PROVENANCE_TEXT_MAX);
        assert_eq!(entry.page, Some(3));
        assert_eq!(entry.kind, SourceKind::Internal);
    }

    #[test]
    fn test_external_entry_carries_tool_and_category() {
        let fact = ExternalFact {
            text: "Market cap ≈ $290B".to_string(),
            url: "https://example/q".to_string(),
            tool: "serpapi".to_string(),
            category: ToolCategory::Generic,
        };
        let entry = ProvenanceEntry::external(&fact);
        assert_eq!(entry.kind, SourceKind::External);
        assert_eq!(entry.source, "https://example/q");
        assert_eq!(entry.tool.as_deref(), Some("serpapi"));
        assert_eq!(entry.category, Some(ToolCategory::Generic));
    }

    #[test]
    fn test_stream_event_serialization_tag() {
        let event = StreamEvent::Token {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"type\":\"token\""));

        let event = StreamEvent::Log {
            message: "working".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"type\":\"log\""));
    }

    #[test]
    fn test_final_event_round_trip() {
        let result = WorkflowResult::failsafe(Vec::new());
        let event = StreamEvent::final_from(result);
        assert!(event.is_final());
        let json = serde_json::to_string(&event).unwrap_or_default();
        let back: StreamEvent = serde_json::from_str(&json).unwrap_or_else(|_| unreachable!());
        assert!(back.is_final());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let text = "é".repeat(10);
        assert_eq!(truncate_chars(&text, 4).chars().count(), 4);
    }

    #[test]
    fn test_source_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SourceKind::Internal).unwrap_or_default(),
            "\"internal\""
        );
    }
}
