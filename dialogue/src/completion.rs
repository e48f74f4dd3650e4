//! Completion service adapter.
//!
//! Both the semantic classifier and the response-assembly stage talk to an
//! external completion service through the [`CompletionBackend`] trait. The
//! bundled HTTP implementation targets an OpenAI-compatible
//! `/v1/chat/completions` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from the completion service
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("completion service returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("malformed completion payload: {0}")]
    MalformedResponse(String),
}

/// One completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,
    /// User content
    pub user: String,
    /// Sampling temperature; classification fixes this at 0 for determinism
    pub temperature: f32,
    /// Output token cap
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build a deterministic (temperature 0) request
    pub fn deterministic(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

/// A black-box completion service
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the raw text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Reqwest-backed client for an OpenAI-compatible chat endpoint
pub struct HttpCompletionBackend {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpCompletionBackend {
    /// Create a client with the given request timeout
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: std::env::var("DIALOGUE_COMPLETION_API_KEY").ok(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Override the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CompletionError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::BadStatus { status, body });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                CompletionError::MalformedResponse(
                    "missing choices[0].message.content".to_string(),
                )
            })
    }
}

/// Health of a completion backend, tracked over time for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    /// Consecutive failures since the last success
    pub consecutive_failures: u32,
    /// Failures before the backend is reported unavailable
    pub failure_threshold: u32,
    /// Total calls made
    pub total_calls: u64,
    /// Total failures
    pub total_failures: u64,
    /// Last observed error message
    pub last_error: Option<String>,
}

impl BackendHealth {
    /// Create a healthy tracker
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            failure_threshold,
            total_calls: 0,
            total_failures: 0,
            last_error: None,
        }
    }

    /// Record a successful call
    pub fn record_success(&mut self) {
        self.total_calls += 1;
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Record a failed call
    pub fn record_failure(&mut self, error: &str) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_error = Some(error.to_string());
    }

    /// Whether the backend is currently considered available
    pub fn is_available(&self) -> bool {
        self.consecutive_failures < self.failure_threshold
    }

    /// Failure rate as a fraction (0.0–1.0)
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_calls as f64
        }
    }
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self::new(3)
    }
}
