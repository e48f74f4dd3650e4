//! Semantic classifier — adapter over the external completion service.
//!
//! Builds a deterministic prompt from the Intent Catalog, calls the
//! service at temperature 0, and parses the reply into a
//! [`ClassificationResult`]. Every failure mode (transport error,
//! deadline, malformed output, unknown intent name) degrades to the
//! synthetic `fallback` intent at confidence 0 — callers never see a
//! transport error.

use crate::catalog::IntentCatalog;
use crate::classify::{ClassificationResult, Provenance};
use crate::completion::{BackendHealth, CompletionBackend, CompletionError, CompletionRequest};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct SemanticReply {
    intent: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    slots: HashMap<String, serde_json::Value>,
    #[serde(default)]
    needs_clarification: bool,
}

/// Adapter that classifies ambiguous input via the completion service
pub struct SemanticClassifier {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
    health: Mutex<BackendHealth>,
}

impl SemanticClassifier {
    /// Create a classifier with the given call deadline
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            health: Mutex::new(BackendHealth::default()),
        }
    }

    /// Current health of the classification backend
    pub fn health(&self) -> BackendHealth {
        self.health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Classify a message against the catalog. Never fails: degraded
    /// outcomes resolve to the `fallback` intent at confidence 0.
    pub async fn classify(
        &self,
        text: &str,
        metadata: &HashMap<String, String>,
        catalog: &IntentCatalog,
    ) -> ClassificationResult {
        let request = CompletionRequest::deterministic(
            system_prompt(catalog),
            user_prompt(text, metadata),
        );

        let raw = match tokio::time::timeout(self.timeout, self.backend.complete(&request)).await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "semantic classifier call failed");
                self.record_failure(&e.to_string());
                return ClassificationResult::fallback(Provenance::Semantic);
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "semantic classifier call timed out");
                self.record_failure("deadline exceeded");
                return ClassificationResult::fallback(Provenance::Semantic);
            }
        };

        match parse_reply(&raw, catalog) {
            Ok(result) => {
                self.record_success();
                debug!(
                    intent = %result.intent,
                    confidence = result.confidence,
                    "semantic classification"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "semantic classifier reply rejected");
                self.record_failure(&e.to_string());
                ClassificationResult::fallback(Provenance::Semantic)
            }
        }
    }

    fn record_success(&self) {
        self.health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_success();
    }

    fn record_failure(&self, error: &str) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        health.record_failure(error);
        if !health.is_available() {
            warn!(
                consecutive_failures = health.consecutive_failures,
                "semantic classification backend unavailable"
            );
        }
    }
}

fn system_prompt(catalog: &IntentCatalog) -> String {
    let mut lines = vec![
        "You classify user messages for a project-portfolio assistant.".to_string(),
        "Reply with strict JSON only, no prose:".to_string(),
        r#"{"intent": "<id>", "confidence": <0..1>, "slots": {"<name>": "<value>"}}"#.to_string(),
        "Use intent \"fallback\" when nothing fits. Known intents:".to_string(),
    ];
    for def in catalog.iter() {
        let slots = if def.required_slots.is_empty() {
            String::new()
        } else {
            format!(" (slots: {})", def.required_slots.join(", "))
        };
        lines.push(format!("- {}: {}{}", def.id, def.description, slots));
    }
    lines.join("\n")
}

fn user_prompt(text: &str, metadata: &HashMap<String, String>) -> String {
    if metadata.is_empty() {
        return text.to_string();
    }
    let mut context: Vec<String> = metadata
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    context.sort();
    format!("{}\n[context: {}]", text, context.join(" "))
}

/// Parse a raw completion into a validated classification
fn parse_reply(raw: &str, catalog: &IntentCatalog) -> Result<ClassificationResult, CompletionError> {
    let json = extract_json(raw).ok_or_else(|| {
        CompletionError::MalformedResponse("no JSON object in reply".to_string())
    })?;

    let reply: SemanticReply = serde_json::from_str(json)
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

    // An intent name outside the catalog is a parse failure, not a new intent.
    if !catalog.contains(&reply.intent) {
        return Err(CompletionError::MalformedResponse(format!(
            "unknown intent '{}'",
            reply.intent
        )));
    }

    let slots = reply
        .slots
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .filter(|(_, v)| !v.trim().is_empty())
        .collect();

    Ok(ClassificationResult {
        intent: reply.intent,
        confidence: reply.confidence.clamp(0.0, 1.0),
        slots,
        needs_clarification: reply.needs_clarification,
        provenance: Provenance::Semantic,
    })
}

/// Pull the first JSON object out of a possibly fenced/annotated reply
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedBackend {
        reply: String,
    }

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<String, CompletionError> {
            Ok(self.reply.clone())
        }
    }

    struct ErrBackend;

    #[async_trait]
    impl CompletionBackend for ErrBackend {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<String, CompletionError> {
            Err(CompletionError::RequestFailed("connection refused".to_string()))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl CompletionBackend for SlowBackend {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("{}".to_string())
        }
    }

    fn classifier(backend: Arc<dyn CompletionBackend>) -> SemanticClassifier {
        SemanticClassifier::new(backend, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_valid_reply_parses() {
        let backend = Arc::new(FixedBackend {
            reply: r#"{"intent": "ask_plan_status", "confidence": 0.8, "slots": {"plan_id": "PRJ-7"}}"#
                .to_string(),
        });
        let catalog = IntentCatalog::default_catalog();
        let result = classifier(backend)
            .classify("come va PRJ-7?", &HashMap::new(), &catalog)
            .await;

        assert_eq!(result.intent, "ask_plan_status");
        assert_eq!(result.slots.get("plan_id").unwrap(), "PRJ-7");
        assert_eq!(result.provenance, Provenance::Semantic);
    }

    #[tokio::test]
    async fn test_fenced_reply_parses() {
        let backend = Arc::new(FixedBackend {
            reply: "```json\n{\"intent\": \"greet\", \"confidence\": 1.0}\n```".to_string(),
        });
        let catalog = IntentCatalog::default_catalog();
        let result = classifier(backend)
            .classify("ciao", &HashMap::new(), &catalog)
            .await;
        assert_eq!(result.intent, "greet");
    }

    #[tokio::test]
    async fn test_unknown_intent_is_parse_failure() {
        let backend = Arc::new(FixedBackend {
            reply: r#"{"intent": "order_pizza", "confidence": 0.99}"#.to_string(),
        });
        let catalog = IntentCatalog::default_catalog();
        let result = classifier(backend)
            .classify("una margherita", &HashMap::new(), &catalog)
            .await;
        assert!(result.is_fallback());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_garbage_reply_degrades_to_fallback() {
        let backend = Arc::new(FixedBackend {
            reply: "I am not JSON".to_string(),
        });
        let catalog = IntentCatalog::default_catalog();
        let result = classifier(backend)
            .classify("boh", &HashMap::new(), &catalog)
            .await;
        assert!(result.is_fallback());
    }

    #[tokio::test]
    async fn test_transport_error_degrades_to_fallback() {
        let catalog = IntentCatalog::default_catalog();
        let semantic = classifier(Arc::new(ErrBackend));
        let result = semantic.classify("boh", &HashMap::new(), &catalog).await;
        assert!(result.is_fallback());
        assert_eq!(semantic.health().total_failures, 1);
    }

    #[tokio::test]
    async fn test_deadline_degrades_to_fallback() {
        let catalog = IntentCatalog::default_catalog();
        let semantic = SemanticClassifier::new(Arc::new(SlowBackend), Duration::from_millis(20));
        let result = semantic.classify("boh", &HashMap::new(), &catalog).await;
        assert!(result.is_fallback());
    }

    #[tokio::test]
    async fn test_confidence_clamped_and_slots_stringified() {
        let backend = Arc::new(FixedBackend {
            reply: r#"{"intent": "ask_plan_status", "confidence": 3.5, "slots": {"plan_id": 42, "noise": ""}}"#
                .to_string(),
        });
        let catalog = IntentCatalog::default_catalog();
        let result = classifier(backend)
            .classify("piano?", &HashMap::new(), &catalog)
            .await;
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.slots.get("plan_id").unwrap(), "42");
        // Empty slot values are dropped
        assert!(!result.slots.contains_key("noise"));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let catalog = IntentCatalog::default_catalog();
        assert_eq!(system_prompt(&catalog), system_prompt(&catalog));

        let mut metadata = HashMap::new();
        metadata.insert("org_unit".to_string(), "sales".to_string());
        metadata.insert("locale".to_string(), "it-IT".to_string());
        // Metadata is sorted, so prompt text is stable across map ordering
        assert_eq!(
            user_prompt("ciao", &metadata),
            user_prompt("ciao", &metadata)
        );
        assert!(user_prompt("ciao", &metadata).contains("locale=it-IT org_unit=sales"));
    }
}
