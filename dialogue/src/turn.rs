//! Turn entry and exit types — the contract with the frontend.

use crate::trace::ExecutionTrace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One incoming message from the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Stable identifier of the sender (session key)
    pub sender_id: String,
    /// Raw message text
    pub text: String,
    /// Arbitrary frontend context (e.g. organizational unit)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TurnRequest {
    /// Create a request with no metadata
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// What kind of reply the core decided to give
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    /// A tool was dispatched and its result is attached
    Answer,
    /// A cheap summary was produced; the expensive path awaits confirmation
    ConfirmationRequest,
    /// The intent is known but a required slot is missing
    Clarification,
    /// Best-effort suggestions after unrecognized input
    Suggestions,
    /// Forced menu of capabilities after repeated unrecognized input
    GuidedHelp,
    /// Simple acknowledgement (decline, stray confirm, greeting)
    Acknowledgement,
    /// An upstream dependency failed; the caller may retry
    Retry,
}

impl std::fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Answer => write!(f, "answer"),
            Self::ConfirmationRequest => write!(f, "confirmation_request"),
            Self::Clarification => write!(f, "clarification"),
            Self::Suggestions => write!(f, "suggestions"),
            Self::GuidedHelp => write!(f, "guided_help"),
            Self::Acknowledgement => write!(f, "acknowledgement"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// The structured outcome of one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    /// Prose from the text-generation collaborator, when available
    pub text: Option<String>,
    /// Reply mode the state machine landed on
    pub mode: ReplyMode,
    /// Final resolved intent id
    pub intent: String,
    /// Structured payload for rich rendering (tool result, summary, menu)
    pub payload: Option<serde_json::Value>,
    /// Follow-up suggestions, when relevant
    pub suggestions: Vec<String>,
    /// Per-step timing for observability
    pub trace: ExecutionTrace,
}
