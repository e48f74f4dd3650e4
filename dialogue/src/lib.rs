//! Dialogue Orchestration Core
//!
//! This library decides *what* a conversational plan assistant answers
//! and *when* it asks for confirmation first:
//! - Classifies free text into a closed intent catalog — a cheap ordered
//!   pattern layer first, an external semantic classifier as fallback
//! - Tracks per-sender dialogue state (slots, confirmation phase,
//!   fallback streaks) under a sliding 300 s TTL
//! - Runs a two-phase summary-then-confirm protocol for expensive answers
//! - Detects fallback loops and escalates to a guided-help menu
//! - Routes resolved intents to the external tool-execution layer,
//!   recording a per-step execution trace
//!
//! Text generation, data retrieval, risk scoring, and the frontend are
//! external collaborators consumed behind traits
//! ([`completion::CompletionBackend`], [`dispatch::ToolExecutor`]).
//!
//! # Usage
//!
//! ```rust,ignore
//! use dialogue::{DialogueEngine, IntentCatalog, OrchestratorConfig, TurnRequest};
//!
//! let engine = DialogueEngine::new(
//!     IntentCatalog::default_catalog(),
//!     OrchestratorConfig::default(),
//!     classifier_backend,
//!     tool_executor,
//! );
//! let reply = engine.handle_turn(TurnRequest::new("sender-1", "piani in ritardo")).await;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod catalog;
pub mod classify;
pub mod completion;
pub mod config;
pub mod dialogue;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod telemetry;
pub mod trace;
pub mod turn;

// Re-export the catalog types
pub use catalog::{IntentCatalog, IntentDef};
pub use catalog::{CONFIRM_INTENT, DECLINE_INTENT, FALLBACK_INTENT, GREET_INTENT, HELP_INTENT};

// Re-export the classification types
pub use classify::{ClassificationResult, HeuristicClassifier, Provenance, SemanticClassifier};

// Re-export the completion adapter types
pub use completion::{
    BackendHealth, CompletionBackend, CompletionError, CompletionRequest, HttpCompletionBackend,
};

// Re-export configuration
pub use config::OrchestratorConfig;

// Re-export the orchestration types
pub use dialogue::{ConfirmationPolicy, DialogueEngine, FallbackRecovery, RecoveryAction};

// Re-export dispatch types
pub use dispatch::{DispatchOutcome, ToolExecutor, ToolRouter};

// Re-export error types
pub use error::{CoreError, CoreResult, ToolError};

// Re-export session types
pub use session::{PendingConfirmation, Phase, SessionState, SessionStore};

// Re-export trace types
pub use trace::{ExecutionTrace, TraceRecorder, TraceStep};

// Re-export turn types
pub use turn::{ReplyMode, TurnReply, TurnRequest};
