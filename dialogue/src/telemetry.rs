//! Structured `tracing` helpers for the turn pipeline.
//!
//! Span and field names use dot notation so they export cleanly to
//! OpenTelemetry-style backends.
//!
//! # Span Hierarchy
//!
//! ```text
//! dialogue.turn            (root — one per incoming message)
//!   ├─ dialogue.classify   (heuristic + semantic classification)
//!   ├─ dialogue.state      (session lookup + state-machine decision)
//!   ├─ dialogue.tool       (downstream tool invocation)
//!   └─ dialogue.compose    (response assembly)
//! ```

use tracing::Span;

// ── Span Name Constants ──────────────────────────────────────────────

/// Root span for one turn end-to-end.
pub const SPAN_TURN: &str = "dialogue.turn";

/// Classification stage.
pub const SPAN_CLASSIFY: &str = "dialogue.classify";

/// Session state lookup and decision.
pub const SPAN_STATE: &str = "dialogue.state";

/// Downstream tool invocation.
pub const SPAN_TOOL: &str = "dialogue.tool";

/// Response assembly.
pub const SPAN_COMPOSE: &str = "dialogue.compose";

// ── Field Name Constants ─────────────────────────────────────────────

pub const FIELD_SENDER_ID: &str = "dialogue.sender_id";
pub const FIELD_INTENT: &str = "dialogue.intent";
pub const FIELD_CONFIDENCE: &str = "dialogue.confidence";
pub const FIELD_PROVENANCE: &str = "dialogue.provenance";
pub const FIELD_PHASE: &str = "dialogue.phase";
pub const FIELD_FALLBACK_STREAK: &str = "dialogue.fallback_streak";
pub const FIELD_MODE: &str = "dialogue.mode";
pub const FIELD_TOOL_NAME: &str = "dialogue.tool.name";
pub const FIELD_DURATION_MS: &str = "dialogue.duration_ms";

/// Root span for one turn.
///
/// Fields filled at creation: `dialogue.sender_id`.
/// Fields filled later by the engine: `dialogue.intent`, `dialogue.mode`.
pub fn turn_span(sender_id: &str) -> Span {
    tracing::info_span!(
        "dialogue.turn",
        "dialogue.sender_id" = %sender_id,
        "dialogue.intent" = tracing::field::Empty,
        "dialogue.mode" = tracing::field::Empty,
    )
}

/// Record the resolved intent and reply mode on a turn span.
pub fn record_turn_result(span: &Span, intent: &str, mode: &str) {
    span.record("dialogue.intent", intent);
    span.record("dialogue.mode", mode);
}

/// Span for a downstream tool invocation.
pub fn tool_span(tool: &str) -> Span {
    tracing::debug_span!(
        "dialogue.tool",
        "dialogue.tool.name" = %tool,
    )
}

/// Install a `fmt` subscriber honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
