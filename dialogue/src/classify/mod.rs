//! Intent classification — a cheap heuristic layer with a semantic
//! fallback behind the completion service.

pub mod heuristic;
pub mod semantic;

use crate::catalog::FALLBACK_INTENT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use heuristic::HeuristicClassifier;
pub use semantic::SemanticClassifier;

/// Which layer produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Pattern-based matcher
    Heuristic,
    /// External completion service
    Semantic,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heuristic => write!(f, "heuristic"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

/// Result of classifying one message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Resolved intent id (always a catalog entry)
    pub intent: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Slot values extracted from the message
    pub slots: HashMap<String, String>,
    /// Whether the classifier itself asked for clarification
    pub needs_clarification: bool,
    /// Which layer produced this result
    pub provenance: Provenance,
}

impl ClassificationResult {
    /// The degenerate result: synthetic `fallback` at confidence 0
    pub fn fallback(provenance: Provenance) -> Self {
        Self {
            intent: FALLBACK_INTENT.to_string(),
            confidence: 0.0,
            slots: HashMap::new(),
            needs_clarification: false,
            provenance,
        }
    }

    /// Whether this is the synthetic `fallback` intent
    pub fn is_fallback(&self) -> bool {
        self.intent == FALLBACK_INTENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_result() {
        let result = ClassificationResult::fallback(Provenance::Semantic);
        assert!(result.is_fallback());
        assert_eq!(result.confidence, 0.0);
        assert!(result.slots.is_empty());
    }

    #[test]
    fn test_provenance_display() {
        assert_eq!(Provenance::Heuristic.to_string(), "heuristic");
        assert_eq!(Provenance::Semantic.to_string(), "semantic");
    }
}
