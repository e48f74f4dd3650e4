//! Intent Catalog — the static registry of everything the assistant can do.
//!
//! Loaded once at startup and shared read-only across workers. The catalog
//! is the single source of truth for recognized intents: any intent name
//! referenced anywhere in the system must resolve here, including the
//! control intents (`confirm`, `decline`) and the synthetic `fallback`.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Synthetic intent meaning "could not classify"
pub const FALLBACK_INTENT: &str = "fallback";
/// Control intent confirming a pending two-phase request
pub const CONFIRM_INTENT: &str = "confirm";
/// Control intent declining a pending two-phase request
pub const DECLINE_INTENT: &str = "decline";
/// Greeting intent
pub const GREET_INTENT: &str = "greet";
/// Capability-menu intent
pub const HELP_INTENT: &str = "help";

/// A single intent definition, immutable after load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDef {
    /// Unique string key
    pub id: String,
    /// Slot names that must be filled before dispatch
    pub required_slots: Vec<String>,
    /// Cost score above which confirmation is required before execution
    pub two_phase_threshold: Option<f32>,
    /// Downstream tool this intent maps to; `None` for control intents
    pub tool: Option<String>,
    /// Base cost fed into the two-phase cost score
    pub base_cost: f32,
    /// Short capability description, used for guided-help menus
    pub description: String,
    /// Example phrase, used for suggestions
    pub example: String,
}

impl IntentDef {
    /// Create a new intent definition with defaults
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required_slots: Vec::new(),
            two_phase_threshold: None,
            tool: None,
            base_cost: 1.0,
            description: String::new(),
            example: String::new(),
        }
    }

    /// Map this intent to a downstream tool
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Declare required slots
    pub fn with_required_slots(mut self, slots: &[&str]) -> Self {
        self.required_slots = slots.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the two-phase confirmation threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.two_phase_threshold = Some(threshold);
        self
    }

    /// Set the base cost
    pub fn with_base_cost(mut self, cost: f32) -> Self {
        self.base_cost = cost;
        self
    }

    /// Set the capability description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the example phrase
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = example.into();
        self
    }

    /// Whether this is a control intent (no downstream tool)
    pub fn is_control(&self) -> bool {
        self.tool.is_none()
    }
}

/// Validated, immutable registry of intent definitions
#[derive(Debug, Clone)]
pub struct IntentCatalog {
    intents: Vec<IntentDef>,
    by_id: HashMap<String, usize>,
}

impl IntentCatalog {
    /// Build a catalog, validating the definitions
    pub fn new(defs: Vec<IntentDef>) -> CoreResult<Self> {
        let mut by_id = HashMap::new();
        for (idx, def) in defs.iter().enumerate() {
            if def.id.trim().is_empty() {
                return Err(CoreError::invalid_catalog("empty intent id"));
            }
            if by_id.insert(def.id.clone(), idx).is_some() {
                return Err(CoreError::invalid_catalog(format!(
                    "duplicate intent id '{}'",
                    def.id
                )));
            }
            if let Some(t) = def.two_phase_threshold {
                if !t.is_finite() || t < 0.0 {
                    return Err(CoreError::invalid_catalog(format!(
                        "intent '{}' has invalid two-phase threshold {}",
                        def.id, t
                    )));
                }
                if def.tool.is_none() {
                    return Err(CoreError::invalid_catalog(format!(
                        "intent '{}' has a two-phase threshold but no mapped tool",
                        def.id
                    )));
                }
            }
            if def.required_slots.iter().any(|s| s.trim().is_empty()) {
                return Err(CoreError::invalid_catalog(format!(
                    "intent '{}' declares an empty slot name",
                    def.id
                )));
            }
            if matches!(def.tool.as_deref(), Some("")) {
                return Err(CoreError::invalid_catalog(format!(
                    "intent '{}' maps to an empty tool name",
                    def.id
                )));
            }
        }

        for required in [FALLBACK_INTENT, CONFIRM_INTENT, DECLINE_INTENT] {
            if !by_id.contains_key(required) {
                return Err(CoreError::invalid_catalog(format!(
                    "missing required control intent '{}'",
                    required
                )));
            }
        }

        Ok(Self {
            intents: defs,
            by_id,
        })
    }

    /// The built-in catalog for the plan assistant domain
    pub fn default_catalog() -> Self {
        let defs = vec![
            IntentDef::new(GREET_INTENT)
                .with_description("Say hello")
                .with_example("Ciao!"),
            IntentDef::new(HELP_INTENT)
                .with_description("List what the assistant can do")
                .with_example("Cosa puoi fare?"),
            IntentDef::new(CONFIRM_INTENT).with_description("Confirm a pending request"),
            IntentDef::new(DECLINE_INTENT).with_description("Decline a pending request"),
            IntentDef::new(FALLBACK_INTENT).with_description("Unrecognized input"),
            IntentDef::new("ask_delayed_plans")
                .with_tool("plans.overdue")
                .with_description("Show plans that are behind schedule")
                .with_example("Quali piani sono in ritardo?"),
            IntentDef::new("ask_plan_status")
                .with_tool("plans.status")
                .with_required_slots(&["plan_id"])
                .with_description("Check the status of a specific plan")
                .with_example("Qual è lo stato del piano PRJ-12?"),
            IntentDef::new("ask_risk_score")
                .with_tool("risk.score")
                .with_required_slots(&["plan_id"])
                .with_base_cost(2.0)
                .with_threshold(2.5)
                .with_description("Compute the risk score of a plan")
                .with_example("Qual è il rischio del piano PRJ-12?"),
            IntentDef::new("ask_portfolio_report")
                .with_tool("reports.portfolio")
                .with_required_slots(&["org_unit"])
                .with_base_cost(3.0)
                .with_threshold(2.5)
                .with_description("Generate a full portfolio report for an organizational unit")
                .with_example("Prepara il report del portfolio per l'area engineering"),
        ];
        // The built-in definitions are statically valid.
        Self::new(defs).expect("built-in catalog is valid")
    }

    /// Look up an intent by id
    pub fn get(&self, id: &str) -> Option<&IntentDef> {
        self.by_id.get(id).map(|&idx| &self.intents[idx])
    }

    /// Whether an intent id exists
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Validate that a referenced intent exists
    pub fn validate_reference(&self, id: &str) -> CoreResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(CoreError::unknown_intent(id))
        }
    }

    /// Number of registered intents
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Iterate over all definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &IntentDef> {
        self.intents.iter()
    }

    /// All slot names any intent declares — used to pick slot values out of
    /// frontend metadata
    pub fn known_slot_names(&self) -> HashSet<&str> {
        self.intents
            .iter()
            .flat_map(|d| d.required_slots.iter().map(|s| s.as_str()))
            .collect()
    }

    /// The guided-help menu: one line per tool-mapped capability
    pub fn capability_menu(&self) -> Vec<String> {
        self.intents
            .iter()
            .filter(|d| !d.is_control())
            .map(|d| format!("{} — e.g. \"{}\"", d.description, d.example))
            .collect()
    }

    /// Best-effort suggestions for an unrecognized input, ranked by token
    /// overlap with each capability's description and example
    pub fn suggestions_for(&self, text: &str, limit: usize) -> Vec<String> {
        let input = tokenize(text);
        let mut scored: Vec<(usize, &IntentDef)> = self
            .intents
            .iter()
            .filter(|d| !d.is_control())
            .map(|d| {
                let mut candidate = tokenize(&d.description);
                candidate.extend(tokenize(&d.example));
                let score = candidate.intersection(&input).count();
                (score, d)
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, d)| d.example.clone())
            .collect()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}
