//! Error types for the research pipeline.
//!
//! Stages return [`QaError`] internally; the orchestrator's top-level
//! wrapper converts failures into stream `error` events plus a failsafe
//! `final` event, so no error ever escapes the public entry points.

use thiserror::Error;

/// Errors produced by pipeline stages and their collaborators.
#[derive(Debug, Error)]
pub enum QaError {
    /// No API key was found in configuration or environment.
    #[error("API key not found. Set OPENAI_API_KEY or QA_API_KEY.")]
    ApiKeyMissing,

    /// The configured provider name is not supported.
    #[error("Unsupported LLM provider: {name}")]
    UnsupportedProvider {
        /// The unrecognized provider name.
        name: String,
    },

    /// An LLM or embedding API request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error description from the transport or service.
        message: String,
        /// HTTP status code, if one was received.
        status: Option<u16>,
    },

    /// A streaming response failed mid-stream.
    #[error("Stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// A stage exceeded its time budget.
    #[error("System timed out ({stage})")]
    Timeout {
        /// Name of the stage that timed out.
        stage: &'static str,
    },

    /// An external tool provider call failed.
    #[error("Tool '{name}' failed: {message}")]
    ToolExecution {
        /// Provider id.
        name: String,
        /// Error description.
        message: String,
    },

    /// PDF loading or text extraction failed.
    #[error("PDF error: {message}")]
    Pdf {
        /// Error description.
        message: String,
    },

    /// Memory file read or write failed.
    #[error("Memory store error: {message}")]
    Memory {
        /// Error description.
        message: String,
    },

    /// Pipeline coordination failed.
    #[error("Orchestration error: {message}")]
    Orchestration {
        /// Error description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_names_stage() {
        let err = QaError::Timeout { stage: "retriever" };
        assert_eq!(err.to_string(), "System timed out (retriever)");
    }

    #[test]
    fn test_tool_execution_display() {
        let err = QaError::ToolExecution {
            name: "serpapi".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("serpapi"));
        assert!(err.to_string().contains("connection refused"));
    }
}
