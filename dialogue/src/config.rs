//! Orchestrator configuration.
//!
//! Defaults match the contracts the frontend relies on (300 s session TTL).
//! Values can be overridden from a TOML file and from `DIALOGUE_*`
//! environment variables, in that order.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the dialogue orchestration core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Seconds of inactivity before a session is evicted
    pub session_ttl_secs: u64,
    /// Minimum confidence for a heuristic match to short-circuit the semantic layer
    pub heuristic_confidence_floor: f32,
    /// Consecutive fallbacks that force the guided-help menu
    pub guided_help_threshold: u32,
    /// Recognized-intent history window kept per session
    pub intent_history_window: usize,
    /// Deadline for the semantic classifier call, in seconds
    pub classify_timeout_secs: u64,
    /// Deadline for a downstream tool call, in seconds
    pub tool_timeout_secs: u64,
    /// Deadline for the response-assembly completion call, in seconds
    pub compose_timeout_secs: u64,
    /// Maximum suggestions returned on a best-effort fallback reply
    pub suggestion_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 300,
            heuristic_confidence_floor: 0.9,
            guided_help_threshold: 3,
            intent_history_window: 8,
            classify_timeout_secs: 8,
            tool_timeout_secs: 10,
            compose_timeout_secs: 8,
            suggestion_limit: 3,
        }
    }
}

impl OrchestratorConfig {
    /// Session time-to-live as a [`Duration`]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Semantic classifier deadline as a [`Duration`]
    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs)
    }

    /// Tool call deadline as a [`Duration`]
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Response-assembly deadline as a [`Duration`]
    pub fn compose_timeout(&self) -> Duration {
        Duration::from_secs(self.compose_timeout_secs)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw)
            .map_err(|e| CoreError::config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Apply `DIALOGUE_*` environment variable overrides
    pub fn apply_env(mut self) -> Self {
        fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = env_parse("DIALOGUE_SESSION_TTL_SECS") {
            self.session_ttl_secs = v;
        }
        if let Some(v) = env_parse("DIALOGUE_CONFIDENCE_FLOOR") {
            self.heuristic_confidence_floor = v;
        }
        if let Some(v) = env_parse("DIALOGUE_GUIDED_HELP_THRESHOLD") {
            self.guided_help_threshold = v;
        }
        if let Some(v) = env_parse("DIALOGUE_CLASSIFY_TIMEOUT_SECS") {
            self.classify_timeout_secs = v;
        }
        if let Some(v) = env_parse("DIALOGUE_TOOL_TIMEOUT_SECS") {
            self.tool_timeout_secs = v;
        }
        if let Some(v) = env_parse("DIALOGUE_COMPOSE_TIMEOUT_SECS") {
            self.compose_timeout_secs = v;
        }
        self
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        Ok(base.apply_env())
    }
}
