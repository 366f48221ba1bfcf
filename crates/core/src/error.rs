//! Error types for the ClawLoop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Tools and model clients each have their own bounded-context enum; the
//! top-level [`Error`] carries the engine's control-flow failures and wraps
//! the bounded ones with enough context to reconstruct the failing call.

use std::sync::Arc;
use thiserror::Error;

/// The top-level error type for all ClawLoop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Model errors ---
    #[error("Model error: {0}")]
    Provider(#[from] ProviderError),

    // --- Agent loop ---
    #[error("Malformed tool call: {reason} (response: {content})")]
    MalformedToolCall { content: String, reason: String },

    #[error("Agent '{agent}' reached the iteration limit ({max_iterations})")]
    IterationExceeded { agent: String, max_iterations: u32 },

    // --- Plan / execute ---
    #[error("Failed to decode plan: {reason}")]
    PlanDecode { reason: String, content: String },

    #[error("Execution of step {index} ('{tool}') failed: {source}")]
    StepExecution {
        index: usize,
        tool: String,
        #[source]
        source: Box<Error>,
    },

    // --- Orchestration ---
    #[error("Agent '{agent}' failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: Arc<Error>,
    },

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent {0:?} is already registered")]
    DuplicateAgent(String),

    #[error("{} of {total} agents failed (indices: {failed:?})", failed.len())]
    Parallel { failed: Vec<usize>, total: usize },

    // --- Cancellation ---
    #[error("Operation canceled")]
    Canceled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Background task failed: {0}")]
    Task(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error still referenced elsewhere, such as by a chained result.
    #[error(transparent)]
    Shared(Arc<Error>),
}

impl Error {
    /// Whether this error came from a cancellation or deadline signal rather
    /// than from the work itself.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::Canceled | Error::DeadlineExceeded => true,
            Error::Shared(inner) => inner.is_cancellation(),
            _ => false,
        }
    }

    /// Take ownership of a shared error without losing its variant.
    ///
    /// Unwraps when this is the last reference. Otherwise an agent wrapper
    /// is rebuilt around the same source, and anything else becomes
    /// [`Error::Shared`].
    pub fn from_shared(shared: Arc<Error>) -> Self {
        match Arc::try_unwrap(shared) {
            Ok(error) => error,
            Err(shared) => match shared.as_ref() {
                Error::Agent { agent, source } => Error::Agent {
                    agent: agent.clone(),
                    source: Arc::clone(source),
                },
                _ => Error::Shared(shared),
            },
        }
    }

    /// Wrap this error with the name of the agent that produced it.
    pub fn in_agent(self, agent: impl Into<String>) -> Self {
        Error::Agent {
            agent: agent.into(),
            source: Arc::new(self),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool {0:?} is already registered")]
    DuplicateName(String),

    #[error("Tool name invalid: {0:?} (must be non-empty and contain no whitespace)")]
    InvalidName(String),

    #[error("Cannot register nil tool")]
    NilTool,

    #[error("Invalid arguments for {tool_name}: {reason}")]
    ArgumentDecode { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// Shorthand for a tool's own execution failure.
    pub fn failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("No response from model")]
    NoResponse,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}
