//! Tool Dispatch Router — maps a resolved intent to its downstream tool.
//!
//! The tool-execution layer itself is an external collaborator behind the
//! [`ToolExecutor`] trait. The router checks required slots, bounds the
//! call with a deadline, and converts every failure into a structured
//! [`DispatchOutcome`] — a missing slot is a follow-up question for the
//! user, never a dispatch-time error.

use crate::catalog::IntentDef;
use crate::error::ToolError;
use crate::telemetry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn, Instrument};

/// The external tool-execution layer
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Invoke a named tool with the given slot mapping
    async fn execute(
        &self,
        tool: &str,
        slots: &HashMap<String, String>,
    ) -> Result<serde_json::Value, ToolError>;
}

/// Structured result of a dispatch attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The tool ran and returned a result
    Completed {
        tool: String,
        result: serde_json::Value,
    },
    /// Required slots are not filled yet; ask a targeted follow-up
    MissingSlots {
        intent: String,
        missing: Vec<String>,
    },
    /// The intent maps to no tool (control intents)
    NoTool { intent: String },
    /// The tool failed or timed out
    Failed {
        tool: String,
        error: String,
        retryable: bool,
    },
}

/// Routes resolved intents to the tool-execution collaborator
pub struct ToolRouter {
    executor: Arc<dyn ToolExecutor>,
    timeout: Duration,
}

impl ToolRouter {
    /// Create a router with the given per-call deadline
    pub fn new(executor: Arc<dyn ToolExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// Slot names required by `def` that are absent or blank in `slots`
    pub fn missing_slots(def: &IntentDef, slots: &HashMap<String, String>) -> Vec<String> {
        def.required_slots
            .iter()
            .filter(|name| {
                !slots
                    .get(*name)
                    .map(|v| !v.trim().is_empty())
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Dispatch an intent with its merged slots
    pub async fn dispatch(
        &self,
        def: &IntentDef,
        slots: &HashMap<String, String>,
    ) -> DispatchOutcome {
        let missing = Self::missing_slots(def, slots);
        if !missing.is_empty() {
            debug!(intent = %def.id, ?missing, "dispatch blocked on missing slots");
            return DispatchOutcome::MissingSlots {
                intent: def.id.clone(),
                missing,
            };
        }

        let tool = match &def.tool {
            Some(tool) => tool.clone(),
            None => {
                return DispatchOutcome::NoTool {
                    intent: def.id.clone(),
                }
            }
        };

        let span = telemetry::tool_span(&tool);
        let call = self.executor.execute(&tool, slots).instrument(span);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => {
                debug!(tool = %tool, "tool completed");
                DispatchOutcome::Completed { tool, result }
            }
            Ok(Err(ToolError::MissingSlot { missing, .. })) => DispatchOutcome::MissingSlots {
                intent: def.id.clone(),
                missing,
            },
            Ok(Err(e)) => {
                warn!(tool = %tool, error = %e, "tool failed");
                DispatchOutcome::Failed {
                    tool,
                    retryable: e.is_retryable(),
                    error: e.to_string(),
                }
            }
            Err(_) => {
                warn!(tool = %tool, timeout = ?self.timeout, "tool timed out");
                DispatchOutcome::Failed {
                    tool: tool.clone(),
                    error: format!("tool '{}' timed out after {:?}", tool, self.timeout),
                    retryable: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IntentDef;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct RecordingExecutor {
        calls: AtomicU32,
        result: serde_json::Value,
    }

    impl RecordingExecutor {
        fn new(result: serde_json::Value) -> Self {
            Self {
                calls: AtomicU32::new(0),
                result,
            }
        }
    }

    #[async_trait]
    impl ToolExecutor for RecordingExecutor {
        async fn execute(
            &self,
            _tool: &str,
            _slots: &HashMap<String, String>,
        ) -> Result<serde_json::Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl ToolExecutor for FailingExecutor {
        async fn execute(
            &self,
            tool: &str,
            _slots: &HashMap<String, String>,
        ) -> Result<serde_json::Value, ToolError> {
            Err(ToolError::upstream(tool, "database connection lost"))
        }
    }

    struct SlowExecutor;

    #[async_trait]
    impl ToolExecutor for SlowExecutor {
        async fn execute(
            &self,
            _tool: &str,
            _slots: &HashMap<String, String>,
        ) -> Result<serde_json::Value, ToolError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(serde_json::json!({}))
        }
    }

    fn status_intent() -> IntentDef {
        IntentDef::new("ask_plan_status")
            .with_tool("plans.status")
            .with_required_slots(&["plan_id"])
    }

    fn slots(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_slot_blocks_without_calling_tool() {
        let executor = Arc::new(RecordingExecutor::new(serde_json::json!({})));
        let router = ToolRouter::new(executor.clone(), Duration::from_secs(1));

        let outcome = router.dispatch(&status_intent(), &HashMap::new()).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::MissingSlots { ref missing, .. } if missing == &vec!["plan_id".to_string()]
        ));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_slot_value_counts_as_missing() {
        let executor = Arc::new(RecordingExecutor::new(serde_json::json!({})));
        let router = ToolRouter::new(executor, Duration::from_secs(1));
        let outcome = router
            .dispatch(&status_intent(), &slots(&[("plan_id", "  ")]))
            .await;
        assert!(matches!(outcome, DispatchOutcome::MissingSlots { .. }));
    }

    #[tokio::test]
    async fn test_completed_dispatch() {
        let executor = Arc::new(RecordingExecutor::new(
            serde_json::json!({"status": "on_track"}),
        ));
        let router = ToolRouter::new(executor.clone(), Duration::from_secs(1));
        let outcome = router
            .dispatch(&status_intent(), &slots(&[("plan_id", "PRJ-1")]))
            .await;

        match outcome {
            DispatchOutcome::Completed { tool, result } => {
                assert_eq!(tool, "plans.status");
                assert_eq!(result["status"], "on_track");
            }
            other => panic!("expected Completed, got {:?}", other),
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_tool_intent() {
        let executor = Arc::new(RecordingExecutor::new(serde_json::json!({})));
        let router = ToolRouter::new(executor, Duration::from_secs(1));
        let def = IntentDef::new("confirm");
        let outcome = router.dispatch(&def, &HashMap::new()).await;
        assert!(matches!(outcome, DispatchOutcome::NoTool { .. }));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_structured() {
        let router = ToolRouter::new(Arc::new(FailingExecutor), Duration::from_secs(1));
        let outcome = router
            .dispatch(&status_intent(), &slots(&[("plan_id", "PRJ-1")]))
            .await;
        match outcome {
            DispatchOutcome::Failed {
                retryable, error, ..
            } => {
                assert!(retryable, "connection loss should be retryable");
                assert!(error.contains("database connection lost"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_structured_and_retryable() {
        let router = ToolRouter::new(Arc::new(SlowExecutor), Duration::from_millis(20));
        let outcome = router
            .dispatch(&status_intent(), &slots(&[("plan_id", "PRJ-1")]))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed { retryable: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_tool_missing_slot_error_maps_to_missing_slots() {
        struct PickyExecutor;

        #[async_trait]
        impl ToolExecutor for PickyExecutor {
            async fn execute(
                &self,
                tool: &str,
                _slots: &HashMap<String, String>,
            ) -> Result<serde_json::Value, ToolError> {
                Err(ToolError::missing_slot(tool, vec!["as_of_date".to_string()]))
            }
        }

        let router = ToolRouter::new(Arc::new(PickyExecutor), Duration::from_secs(1));
        let outcome = router
            .dispatch(&status_intent(), &slots(&[("plan_id", "PRJ-1")]))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::MissingSlots { ref missing, .. } if missing == &vec!["as_of_date".to_string()]
        ));
    }

    #[test]
    fn test_outcome_serde_tagging() {
        let outcome = DispatchOutcome::MissingSlots {
            intent: "ask_plan_status".to_string(),
            missing: vec!["plan_id".to_string()],
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"outcome\":\"missing_slots\""));
    }
}
