//! Pattern-based intent matcher, run before any semantic call.
//!
//! Matching is ordered: specific multi-word patterns come first, and the
//! short affirmation/negation tokens are only interpreted as
//! confirm/decline while the session phase is `awaiting_confirmation`.
//! Outside that phase a bare "sì"/"no" falls through to the semantic
//! layer instead of being guessed. This ordering is a correctness
//! invariant, not an optimization.
//!
//! Pure function over text + phase; no side effects.

use crate::catalog::{CONFIRM_INTENT, DECLINE_INTENT, GREET_INTENT, HELP_INTENT};
use crate::classify::{ClassificationResult, Provenance};
use crate::session::state::Phase;
use regex::Regex;
use std::collections::HashMap;

struct IntentPattern {
    regex: Regex,
    intent: &'static str,
    confidence: f32,
}

/// Fast pattern-based classifier over the plan-assistant phrasing
pub struct HeuristicClassifier {
    patterns: Vec<IntentPattern>,
    confirm_re: Regex,
    decline_re: Regex,
    plan_code_re: Regex,
    plan_number_re: Regex,
    org_unit_re: Regex,
    confidence_floor: f32,
}

impl HeuristicClassifier {
    /// Compile the pattern table. Patterns below `confidence_floor` never
    /// short-circuit the semantic layer.
    pub fn new(confidence_floor: f32) -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("valid heuristic pattern");

        // Ordered most-specific first. Overlapping phrasings (e.g. a status
        // question about delayed plans) must resolve to the narrower intent.
        let patterns = vec![
            IntentPattern {
                regex: compile(
                    r"(?i)\b(?:piani|progetti|plans?)\b.*\b(?:in ritardo|ritardo|delayed|overdue|late)\b|(?i)\b(?:delayed|overdue|late)\b.*\bplans?\b",
                ),
                intent: "ask_delayed_plans",
                confidence: 0.95,
            },
            IntentPattern {
                regex: compile(
                    r"(?i)\b(?:stato|status|avanzamento|come procede)\b.*\b(?:piano|piani|plan|plans|progetto)\b|(?i)\b(?:piano|plan|progetto)\b.*\b(?:stato|status|avanzamento)\b",
                ),
                intent: "ask_plan_status",
                confidence: 0.92,
            },
            IntentPattern {
                regex: compile(r"(?i)\b(?:rischio|rischi|risk(?:\s+score)?)\b"),
                intent: "ask_risk_score",
                confidence: 0.92,
            },
            IntentPattern {
                regex: compile(
                    r"(?i)\b(?:report|riepilogo|summary)\b.*\b(?:portfolio|portafoglio)\b|(?i)\b(?:portfolio|portafoglio)\b.*\b(?:report|riepilogo|summary)\b",
                ),
                intent: "ask_portfolio_report",
                confidence: 0.92,
            },
            IntentPattern {
                regex: compile(r"(?i)^(?:aiuto|help|cosa (?:puoi|sai) fare|what can you do)\b"),
                intent: HELP_INTENT,
                confidence: 0.95,
            },
            IntentPattern {
                regex: compile(r"(?i)^(?:ciao|salve|buongiorno|buonasera|hi|hello|hey)\b"),
                intent: GREET_INTENT,
                confidence: 0.95,
            },
        ];

        Self {
            patterns,
            confirm_re: compile(
                r"(?i)^(?:s[iì]|yes|ok(?:ay)?|va bene|certo|conferma|confermo|procedi|proceed|go ahead|sure|d'accordo|y)[.!]?$",
            ),
            decline_re: compile(
                r"(?i)^(?:no|nope|annulla|cancel|non ora|not now|lascia stare|stop|n)[.!]?$",
            ),
            plan_code_re: compile(r"\b([A-Z]{2,5}-\d{1,5})\b"),
            plan_number_re: compile(r"(?i)\b(?:piano|plan|progetto)\s+#?(\d{1,6})\b"),
            org_unit_re: compile(
                r"(?i)\b(?:unit[aà]|area|team|reparto|department)\s+([A-Za-z][\w-]*)",
            ),
            confidence_floor,
        }
    }

    /// Classify a message, returning `None` when no confident match exists
    pub fn classify(&self, text: &str, phase: Phase) -> Option<ClassificationResult> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        for pattern in &self.patterns {
            if pattern.confidence < self.confidence_floor {
                continue;
            }
            if pattern.regex.is_match(trimmed) {
                return Some(ClassificationResult {
                    intent: pattern.intent.to_string(),
                    confidence: pattern.confidence,
                    slots: self.extract_slots(trimmed),
                    needs_clarification: false,
                    provenance: Provenance::Heuristic,
                });
            }
        }

        // Bare confirm/decline tokens are ambiguous outside a pending
        // confirmation and must fall through to the semantic layer.
        if phase == Phase::AwaitingConfirmation {
            if self.confirm_re.is_match(trimmed) {
                return Some(control_result(CONFIRM_INTENT));
            }
            if self.decline_re.is_match(trimmed) {
                return Some(control_result(DECLINE_INTENT));
            }
        }

        None
    }

    /// Extract slot values from the message text
    pub fn extract_slots(&self, text: &str) -> HashMap<String, String> {
        let mut slots = HashMap::new();

        if let Some(caps) = self.plan_code_re.captures(text) {
            slots.insert("plan_id".to_string(), caps[1].to_string());
        } else if let Some(caps) = self.plan_number_re.captures(text) {
            slots.insert("plan_id".to_string(), format!("PRJ-{}", &caps[1]));
        }

        if let Some(caps) = self.org_unit_re.captures(text) {
            slots.insert("org_unit".to_string(), caps[1].to_lowercase());
        }

        slots
    }
}

fn control_result(intent: &str) -> ClassificationResult {
    ClassificationResult {
        intent: intent.to_string(),
        confidence: 0.95,
        slots: HashMap::new(),
        needs_clarification: false,
        provenance: Provenance::Heuristic,
    }
}
