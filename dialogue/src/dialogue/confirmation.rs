//! Two-phase confirmation policy.
//!
//! Expensive answers are not computed outright: when a resolved intent's
//! cost score exceeds its catalog threshold, the turn emits a cheap
//! summary instead and parks the request in the session until the user
//! confirms or declines. The score is fully deterministic: a per-intent
//! base cost plus modifiers for breadth keywords in the message.

use crate::catalog::IntentDef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Keywords that widen a query's scope and raise its cost
const BREADTH_KEYWORDS: &[&str] = &[
    "all",
    "tutti",
    "tutto",
    "complete",
    "completo",
    "completa",
    "entire",
    "intero",
    "full",
    "dettagliato",
    "detailed",
    "everything",
    "storico",
    "history",
];

/// Deterministic cost scoring for the two-phase protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    /// Cost added per matched breadth keyword
    pub breadth_bonus: f32,
    /// Maximum total bonus from keywords
    pub breadth_cap: f32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            breadth_bonus: 0.5,
            breadth_cap: 2.0,
        }
    }
}

impl ConfirmationPolicy {
    /// Compute the cost score for this intent on this message
    pub fn cost_score(&self, def: &IntentDef, text: &str) -> f32 {
        let lower = text.to_lowercase();
        let mut bonus = 0.0f32;
        for keyword in BREADTH_KEYWORDS {
            if lower.contains(keyword) {
                bonus += self.breadth_bonus;
            }
        }
        def.base_cost + bonus.min(self.breadth_cap)
    }

    /// Whether this score trips the intent's two-phase threshold
    pub fn requires_confirmation(&self, def: &IntentDef, score: f32) -> bool {
        matches!(def.two_phase_threshold, Some(threshold) if score > threshold)
    }

    /// The cheap summary payload shown while awaiting confirmation
    pub fn build_summary(
        &self,
        def: &IntentDef,
        slots: &HashMap<String, String>,
        score: f32,
    ) -> serde_json::Value {
        serde_json::json!({
            "intent": def.id,
            "tool": def.tool,
            "slots": slots,
            "estimated_cost": score,
        })
    }
}
