//! Execution traces — per-turn step timing for observability.
//!
//! A trace records which pipeline steps a turn visited and how long each
//! took. Traces never affect control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Classification stage (heuristic, then semantic if needed)
pub const STEP_CLASSIFY: &str = "classify";
/// Session lookup and state-machine decision
pub const STEP_DIALOGUE_STATE: &str = "dialogue-state";
/// Downstream tool invocation
pub const STEP_TOOL: &str = "tool";
/// Reply directive construction and optional prose composition
pub const STEP_RESPONSE_ASSEMBLY: &str = "response-assembly";

/// A single completed pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    /// Step name
    pub name: String,
    /// Elapsed wall-clock time in milliseconds
    pub duration_ms: u64,
}

/// Completed trace for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Unique id for this turn
    pub turn_id: String,
    /// When the turn started
    pub started_at: DateTime<Utc>,
    /// Steps in the order they were visited
    pub steps: Vec<TraceStep>,
    /// Total elapsed time in milliseconds
    pub total_ms: u64,
}

impl ExecutionTrace {
    /// Step names in visit order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Whether a step with this name was visited
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    /// Duration of the first step with this name, if visited
    pub fn duration_of(&self, name: &str) -> Option<u64> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.duration_ms)
    }
}

/// Incrementally records steps during a turn
pub struct TraceRecorder {
    turn_id: String,
    started_at: DateTime<Utc>,
    t0: Instant,
    steps: Vec<TraceStep>,
    current: Option<(String, Instant)>,
}

impl TraceRecorder {
    /// Start recording a new turn
    pub fn new() -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            t0: Instant::now(),
            steps: Vec::new(),
            current: None,
        }
    }

    /// The id assigned to this turn
    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    /// Begin a step, finishing the previous one if still open
    pub fn begin_step(&mut self, name: &str) {
        self.end_step();
        self.current = Some((name.to_string(), Instant::now()));
    }

    /// Finish the current step, if any
    pub fn end_step(&mut self) {
        if let Some((name, started)) = self.current.take() {
            self.steps.push(TraceStep {
                name,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    /// Finish recording and produce the trace
    pub fn finish(mut self) -> ExecutionTrace {
        self.end_step();
        ExecutionTrace {
            turn_id: self.turn_id,
            started_at: self.started_at,
            steps: self.steps,
            total_ms: self.t0.elapsed().as_millis() as u64,
        }
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}
