//! Error types for the Cartwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the loop records the
//! `Display` text of tool-side errors into `AgentState::error`.

use thiserror::Error;

/// The top-level error type for all Cartwise operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Call(#[from] CallError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures decoding the single-line `FUNCTION_CALL:` protocol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("Malformed call line: {0}")]
    MalformedCall(String),

    #[error("Malformed parameter segment '{segment}' (expected key=value)")]
    MalformedParam { segment: String },
}

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Model returned invalid output: {0}")]
    InvalidOutput(String),

    #[error("Model not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Malformed tool call: {0}")]
    Malformed(#[from] CallError),
}

/// Reasons a planning step could not produce a usable decision.
#[derive(Debug, Clone, Error)]
pub enum DecisionError {
    #[error("Decision model failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid decision shape: {0}")]
    InvalidShape(String),

    #[error("Decision rejected by policy: {0}")]
    PolicyViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_displays_correctly() {
        let err = Error::Llm(LlmError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::ExecutionFailed {
            tool_name: "search_product_documents".into(),
            reason: "catalog offline".into(),
        };
        assert!(err.to_string().contains("search_product_documents"));
        assert!(err.to_string().contains("catalog offline"));
    }

    #[test]
    fn malformed_call_wraps_into_tool_error() {
        let err: ToolError = CallError::MalformedParam { segment: "oops".into() }.into();
        assert!(matches!(err, ToolError::Malformed(_)));
        assert!(err.to_string().contains("oops"));
    }
}
