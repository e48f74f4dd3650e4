//! Integration test for file-based configuration driving the engine.

use async_trait::async_trait;
use dialogue::{
    CompletionBackend, CompletionError, CompletionRequest, DialogueEngine, IntentCatalog,
    OrchestratorConfig, ReplyMode, ToolError, ToolExecutor, TurnRequest,
};
use std::collections::HashMap;
use std::sync::Arc;

struct DownBackend;

#[async_trait]
impl CompletionBackend for DownBackend {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::RequestFailed("offline".to_string()))
    }
}

struct NullExecutor;

#[async_trait]
impl ToolExecutor for NullExecutor {
    async fn execute(
        &self,
        _tool: &str,
        _slots: &HashMap<String, String>,
    ) -> Result<serde_json::Value, ToolError> {
        Ok(serde_json::json!({}))
    }
}

#[tokio::test]
async fn test_engine_honors_file_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dialogue.toml");
    std::fs::write(
        &path,
        "session_ttl_secs = 120\nsuggestion_limit = 2\nguided_help_threshold = 2\n",
    )?;

    let config = OrchestratorConfig::load(Some(&path))?;
    assert_eq!(config.session_ttl_secs, 120);

    let engine = DialogueEngine::new(
        IntentCatalog::default_catalog(),
        config,
        Arc::new(DownBackend),
        Arc::new(NullExecutor),
    );

    // suggestion_limit = 2 caps the best-effort suggestions
    let reply = engine.handle_turn(TurnRequest::new("s1", "xyzzy")).await;
    assert_eq!(reply.mode, ReplyMode::Suggestions);
    assert_eq!(reply.suggestions.len(), 2);

    // guided_help_threshold = 2 forces the menu one miss earlier
    let reply = engine.handle_turn(TurnRequest::new("s1", "frob")).await;
    assert_eq!(reply.mode, ReplyMode::GuidedHelp);

    Ok(())
}

#[tokio::test]
async fn test_default_config_when_no_file() -> anyhow::Result<()> {
    let config = OrchestratorConfig::load(None)?;
    assert_eq!(config.session_ttl_secs, 300);
    Ok(())
}
