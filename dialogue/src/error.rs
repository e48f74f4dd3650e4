//! Error types for the orchestration core.
//!
//! Everything in this taxonomy is handled *inside* the core and converted
//! into a well-formed reply directive; nothing propagates past the turn
//! boundary to the caller.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the orchestration core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Neither classifier produced a usable intent
    #[error("classification failed: {message}")]
    ClassificationFailure { message: String },

    /// Intent resolved but slot-filling is incomplete
    #[error("intent '{intent}' is missing required slot(s): {missing:?}")]
    MissingRequiredSlot { intent: String, missing: Vec<String> },

    /// An upstream call (semantic classifier or tool) exceeded its deadline
    #[error("'{stage}' exceeded its deadline of {timeout:?}")]
    UpstreamTimeout { stage: String, timeout: Duration },

    /// Operation referenced a sender whose state was already evicted
    #[error("session for '{sender_id}' expired after {idle_secs}s idle")]
    SessionExpired { sender_id: String, idle_secs: i64 },

    /// An intent name was referenced that the catalog does not know
    #[error("unknown intent: '{intent}'")]
    UnknownIntent { intent: String },

    /// The intent catalog failed validation at load
    #[error("invalid intent catalog: {message}")]
    InvalidCatalog { message: String },

    /// Configuration could not be loaded or parsed
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Create a classification failure error
    pub fn classification(message: impl Into<String>) -> Self {
        Self::ClassificationFailure {
            message: message.into(),
        }
    }

    /// Create a missing-slot error
    pub fn missing_slot(intent: impl Into<String>, missing: Vec<String>) -> Self {
        Self::MissingRequiredSlot {
            intent: intent.into(),
            missing,
        }
    }

    /// Create an upstream timeout error
    pub fn timeout(stage: impl Into<String>, timeout: Duration) -> Self {
        Self::UpstreamTimeout {
            stage: stage.into(),
            timeout,
        }
    }

    /// Create an unknown-intent error
    pub fn unknown_intent(intent: impl Into<String>) -> Self {
        Self::UnknownIntent {
            intent: intent.into(),
        }
    }

    /// Create an invalid-catalog error
    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether retrying the same turn could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }
}

/// Typed errors returned by the external tool-execution layer
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool ran but the backing data set had no answer
    #[error("tool '{tool}': required data missing: {message}")]
    MissingData { tool: String, message: String },

    /// The tool rejected the call because a slot it needs was absent
    #[error("tool '{tool}': missing slot(s): {missing:?}")]
    MissingSlot { tool: String, missing: Vec<String> },

    /// The tool's own upstream dependency failed
    #[error("tool '{tool}': upstream error: {message}")]
    Upstream { tool: String, message: String },

    /// The tool call exceeded its deadline
    #[error("tool '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
}

impl ToolError {
    /// Create a missing-data error
    pub fn missing_data(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingData {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a missing-slot error
    pub fn missing_slot(tool: impl Into<String>, missing: Vec<String>) -> Self {
        Self::MissingSlot {
            tool: tool.into(),
            missing,
        }
    }

    /// Create an upstream error
    pub fn upstream(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this failure is transient
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Upstream { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("timeout")
                    || lower.contains("connection")
                    || lower.contains("unavailable")
                    || lower.contains("overloaded")
            }
            Self::MissingData { .. } | Self::MissingSlot { .. } => false,
        }
    }
}
