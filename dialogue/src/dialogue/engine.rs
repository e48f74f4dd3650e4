//! The turn pipeline.
//!
//! One call to [`DialogueEngine::handle_turn`] takes a message from
//! classification through the dialogue state machines to tool dispatch
//! and response assembly, and always returns a well-formed [`TurnReply`]
//! — every failure mode lands on a coherent reply directive, never an
//! error at the turn boundary.
//!
//! Session state is snapshotted up front and the resulting transition is
//! applied in a single atomic per-sender update only after every await
//! has completed, so a turn cancelled mid-flight cannot leave a session
//! in an inconsistent phase.

use crate::catalog::{
    IntentCatalog, CONFIRM_INTENT, DECLINE_INTENT, GREET_INTENT, HELP_INTENT,
};
use crate::classify::{ClassificationResult, HeuristicClassifier, SemanticClassifier};
use crate::completion::{CompletionBackend, CompletionRequest};
use crate::config::OrchestratorConfig;
use crate::dialogue::confirmation::ConfirmationPolicy;
use crate::dialogue::recovery::{FallbackRecovery, RecoveryAction};
use crate::dispatch::{DispatchOutcome, ToolExecutor, ToolRouter};
use crate::session::state::{PendingConfirmation, Phase, SessionState};
use crate::session::store::SessionStore;
use crate::telemetry;
use crate::trace::{
    TraceRecorder, STEP_CLASSIFY, STEP_DIALOGUE_STATE, STEP_RESPONSE_ASSEMBLY, STEP_TOOL,
};
use crate::turn::{ReplyMode, TurnReply, TurnRequest};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// What the dialogue state machines decided to do with this turn
#[derive(Debug, Clone)]
enum TurnAction {
    /// Dispatch the resolved intent immediately
    Dispatch {
        intent: String,
        slots: HashMap<String, String>,
    },
    /// Park the request and ask for confirmation
    AskConfirmation {
        intent: String,
        slots: HashMap<String, String>,
        summary: serde_json::Value,
        cost: f32,
    },
    /// Dispatch a previously parked request (user confirmed)
    DispatchPending { pending: PendingConfirmation },
    /// Acknowledge without doing anything (decline, stray confirm, greeting)
    Acknowledge { greeting: bool },
    /// Ask a targeted follow-up for missing slots
    Clarify {
        intent: String,
        missing: Vec<String>,
    },
    /// Best-effort suggestions after an unrecognized turn
    Suggest,
    /// Forced capability menu
    GuidedHelp,
}

#[derive(Debug, Clone)]
struct Decision {
    action: TurnAction,
    /// Value the fallback streak must take after this turn
    new_streak: u32,
    /// Whether this turn effectively resolved to `fallback`
    is_fallback: bool,
}

/// The dialogue orchestration core
pub struct DialogueEngine {
    catalog: Arc<IntentCatalog>,
    config: OrchestratorConfig,
    heuristic: HeuristicClassifier,
    semantic: SemanticClassifier,
    sessions: Arc<SessionStore>,
    router: ToolRouter,
    policy: ConfirmationPolicy,
    recovery: FallbackRecovery,
    composer: Option<Arc<dyn CompletionBackend>>,
}

impl DialogueEngine {
    /// Assemble the engine from its collaborators
    pub fn new(
        catalog: IntentCatalog,
        config: OrchestratorConfig,
        classifier_backend: Arc<dyn CompletionBackend>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        let heuristic = HeuristicClassifier::new(config.heuristic_confidence_floor);
        let semantic = SemanticClassifier::new(classifier_backend, config.classify_timeout());
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        let router = ToolRouter::new(executor, config.tool_timeout());
        let recovery = FallbackRecovery::new(config.guided_help_threshold);

        Self {
            catalog: Arc::new(catalog),
            config,
            heuristic,
            semantic,
            sessions,
            router,
            policy: ConfirmationPolicy::default(),
            recovery,
            composer: None,
        }
    }

    /// Attach a text-generation backend for prose replies
    pub fn with_composer(mut self, composer: Arc<dyn CompletionBackend>) -> Self {
        self.composer = Some(composer);
        self
    }

    /// The session store, for sweeper wiring and inspection
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The intent catalog
    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    /// Handle one incoming message end-to-end
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnReply {
        let span = telemetry::turn_span(&request.sender_id);
        self.run_turn(request).instrument(span).await
    }

    async fn run_turn(&self, request: TurnRequest) -> TurnReply {
        let mut recorder = TraceRecorder::new();

        // ── classify ──────────────────────────────────────────────────
        recorder.begin_step(STEP_CLASSIFY);
        let snapshot = self.sessions.snapshot(&request.sender_id);
        let mut classification = match self.heuristic.classify(&request.text, snapshot.phase) {
            Some(result) => result,
            None => {
                self.semantic
                    .classify(&request.text, &request.metadata, &self.catalog)
                    .await
            }
        };
        self.merge_metadata_slots(&mut classification, &request.metadata);
        debug!(
            intent = %classification.intent,
            confidence = classification.confidence,
            provenance = %classification.provenance,
            phase = %snapshot.phase,
            "classified"
        );

        // ── dialogue-state ────────────────────────────────────────────
        recorder.begin_step(STEP_DIALOGUE_STATE);
        let decision = self.decide(&snapshot, &classification, &request.text);

        // ── tool ──────────────────────────────────────────────────────
        let outcome = match &decision.action {
            TurnAction::Dispatch { intent, slots } => {
                recorder.begin_step(STEP_TOOL);
                Some(self.dispatch_intent(intent, slots).await)
            }
            TurnAction::DispatchPending { pending } => {
                recorder.begin_step(STEP_TOOL);
                Some(self.dispatch_intent(&pending.intent, &pending.slots).await)
            }
            _ => None,
        };

        // ── response-assembly ─────────────────────────────────────────
        recorder.begin_step(STEP_RESPONSE_ASSEMBLY);
        let (mode, payload, suggestions) =
            self.assemble(&decision.action, outcome.as_ref(), &request.text);

        let resolved_intent = match &decision.action {
            TurnAction::DispatchPending { pending } => pending.intent.clone(),
            _ => classification.intent.clone(),
        };

        let text = if mode == ReplyMode::Answer {
            self.compose_prose(&resolved_intent, payload.as_ref()).await
        } else {
            None
        };

        // ── apply state (all awaits are behind us) ────────────────────
        self.apply_state(&request, &classification, &decision);

        let trace = recorder.finish();
        telemetry::record_turn_result(
            &tracing::Span::current(),
            &resolved_intent,
            &mode.to_string(),
        );
        info!(
            intent = %resolved_intent,
            mode = %mode,
            total_ms = trace.total_ms,
            "turn complete"
        );

        TurnReply {
            text,
            mode,
            intent: resolved_intent,
            payload,
            suggestions,
            trace,
        }
    }

    /// Copy slot values out of frontend metadata for slot names the
    /// catalog knows, without overriding values extracted from the text
    fn merge_metadata_slots(
        &self,
        classification: &mut ClassificationResult,
        metadata: &HashMap<String, String>,
    ) {
        let known = self.catalog.known_slot_names();
        for (key, value) in metadata {
            if known.contains(key.as_str()) && !value.trim().is_empty() {
                classification
                    .slots
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }

    /// The deterministic per-turn decision. Pure over its inputs.
    fn decide(
        &self,
        snapshot: &SessionState,
        classification: &ClassificationResult,
        text: &str,
    ) -> Decision {
        // A name outside the catalog is a classification failure, never a
        // new intent.
        let is_fallback =
            classification.is_fallback() || !self.catalog.contains(&classification.intent);

        // Loop-breaking takes priority over everything else.
        let (recovery_action, new_streak) =
            self.recovery.evaluate(snapshot.fallback_streak, is_fallback);
        match recovery_action {
            RecoveryAction::GuidedHelp => {
                info!(streak = snapshot.fallback_streak + 1, "fallback loop broken");
                return Decision {
                    action: TurnAction::GuidedHelp,
                    new_streak,
                    is_fallback,
                };
            }
            RecoveryAction::Suggest => {
                return Decision {
                    action: TurnAction::Suggest,
                    new_streak,
                    is_fallback,
                };
            }
            RecoveryAction::Continue => {}
        }

        let intent = classification.intent.as_str();
        let done = |action: TurnAction| Decision {
            action,
            new_streak,
            is_fallback,
        };

        if snapshot.phase == Phase::AwaitingConfirmation {
            match intent {
                CONFIRM_INTENT => {
                    return match snapshot.pending.clone() {
                        Some(pending) => done(TurnAction::DispatchPending { pending }),
                        // Confirm with nothing parked (double confirm, or the
                        // pending request aged out with the session)
                        None => done(TurnAction::Acknowledge { greeting: false }),
                    };
                }
                DECLINE_INTENT => return done(TurnAction::Acknowledge { greeting: false }),
                // Any other intent abandons the pending request silently and
                // is processed normally below (reset-on-distraction).
                _ => {}
            }
        } else if intent == CONFIRM_INTENT || intent == DECLINE_INTENT {
            // Nothing pending; a stray confirm/decline is a no-op.
            return done(TurnAction::Acknowledge { greeting: false });
        }

        if intent == GREET_INTENT {
            return done(TurnAction::Acknowledge { greeting: true });
        }
        if intent == HELP_INTENT {
            return done(TurnAction::GuidedHelp);
        }

        let def = match self.catalog.get(intent) {
            Some(def) => def,
            // Unreachable: is_fallback covered unknown names above.
            None => return done(TurnAction::Suggest),
        };

        // Carry-forward merge: prior slots, overridden by this turn's.
        let mut slots = snapshot.slots.clone();
        for (key, value) in &classification.slots {
            slots.insert(key.clone(), value.clone());
        }

        let missing = ToolRouter::missing_slots(def, &slots);
        if !missing.is_empty() {
            return done(TurnAction::Clarify {
                intent: intent.to_string(),
                missing,
            });
        }

        let cost = self.policy.cost_score(def, text);
        if self.policy.requires_confirmation(def, cost) {
            let summary = self.policy.build_summary(def, &slots, cost);
            return done(TurnAction::AskConfirmation {
                intent: intent.to_string(),
                slots,
                summary,
                cost,
            });
        }

        done(TurnAction::Dispatch {
            intent: intent.to_string(),
            slots,
        })
    }

    async fn dispatch_intent(
        &self,
        intent: &str,
        slots: &HashMap<String, String>,
    ) -> DispatchOutcome {
        match self.catalog.get(intent) {
            Some(def) => self.router.dispatch(def, slots).await,
            None => DispatchOutcome::Failed {
                tool: String::new(),
                error: format!("unknown intent '{}'", intent),
                retryable: false,
            },
        }
    }

    fn assemble(
        &self,
        action: &TurnAction,
        outcome: Option<&DispatchOutcome>,
        text: &str,
    ) -> (ReplyMode, Option<serde_json::Value>, Vec<String>) {
        match action {
            TurnAction::Dispatch { .. } | TurnAction::DispatchPending { .. } => match outcome {
                Some(DispatchOutcome::Completed { tool, result }) => (
                    ReplyMode::Answer,
                    Some(serde_json::json!({ "tool": tool, "result": result })),
                    Vec::new(),
                ),
                Some(DispatchOutcome::MissingSlots { intent, missing }) => (
                    ReplyMode::Clarification,
                    Some(serde_json::json!({ "intent": intent, "missing_slots": missing })),
                    Vec::new(),
                ),
                Some(DispatchOutcome::NoTool { .. }) => {
                    (ReplyMode::Acknowledgement, None, Vec::new())
                }
                Some(DispatchOutcome::Failed {
                    tool,
                    error,
                    retryable,
                }) => (
                    ReplyMode::Retry,
                    Some(serde_json::json!({
                        "tool": tool,
                        "error": error,
                        "retryable": retryable,
                    })),
                    Vec::new(),
                ),
                // Dispatch actions always produce an outcome.
                None => (ReplyMode::Retry, None, Vec::new()),
            },
            TurnAction::AskConfirmation { summary, .. } => (
                ReplyMode::ConfirmationRequest,
                Some(summary.clone()),
                Vec::new(),
            ),
            TurnAction::Acknowledge { greeting } => {
                let suggestions = if *greeting {
                    self.catalog
                        .suggestions_for(text, self.config.suggestion_limit)
                } else {
                    Vec::new()
                };
                (ReplyMode::Acknowledgement, None, suggestions)
            }
            TurnAction::Clarify { intent, missing } => (
                ReplyMode::Clarification,
                Some(serde_json::json!({ "intent": intent, "missing_slots": missing })),
                Vec::new(),
            ),
            TurnAction::Suggest => (
                ReplyMode::Suggestions,
                None,
                self.catalog
                    .suggestions_for(text, self.config.suggestion_limit),
            ),
            TurnAction::GuidedHelp => {
                let menu = self.catalog.capability_menu();
                (
                    ReplyMode::GuidedHelp,
                    Some(serde_json::json!({ "capabilities": menu })),
                    menu,
                )
            }
        }
    }

    async fn compose_prose(
        &self,
        intent: &str,
        payload: Option<&serde_json::Value>,
    ) -> Option<String> {
        let composer = self.composer.as_ref()?;
        let request = CompletionRequest::deterministic(
            "You turn structured tool results into one short, friendly reply \
             for the user, in the user's language.",
            serde_json::json!({ "intent": intent, "payload": payload }).to_string(),
        );

        match tokio::time::timeout(self.config.compose_timeout(), composer.complete(&request))
            .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(error = %e, "response composition failed, returning structured reply");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.config.compose_timeout(), "response composition timed out");
                None
            }
        }
    }

    /// Apply the turn's state transition in one atomic per-sender update
    fn apply_state(
        &self,
        request: &TurnRequest,
        classification: &ClassificationResult,
        decision: &Decision,
    ) {
        let window = self.config.intent_history_window;
        self.sessions.update(&request.sender_id, |state| {
            // Only this turn's freshly extracted slots are merged here;
            // carry-forward values are already present.
            state.merge_slots(&classification.slots);

            state.fallback_streak = decision.new_streak;
            if !decision.is_fallback {
                state.record_intent(&classification.intent, window);
            }

            match &decision.action {
                TurnAction::AskConfirmation {
                    intent,
                    slots,
                    summary,
                    cost,
                } => {
                    state.phase = Phase::AwaitingConfirmation;
                    state.pending = Some(PendingConfirmation {
                        intent: intent.clone(),
                        slots: slots.clone(),
                        summary: summary.clone(),
                        cost: *cost,
                        created_at: Utc::now(),
                    });
                }
                // Unrecognized input is not an "unrelated intent": a parked
                // request survives classification noise.
                TurnAction::Suggest | TurnAction::GuidedHelp if decision.is_fallback => {}
                // Every other action lands back in idle; an abandoned
                // pending request is discarded here.
                _ => {
                    state.phase = Phase::Idle;
                    state.pending = None;
                }
            }
        });
    }
}
