//! Inference backend client.
//!
//! [`LlmClient`] is the seam the analyzer and ranker call through;
//! [`OllamaClient`] speaks the non-streaming `/api/generate` endpoint of a
//! local Ollama server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use docflow_core::{BackendConfig, StageError};

/// Failures talking to the inference backend.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("cannot reach backend: {0}")]
    Connect(String),

    #[error("backend answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed backend reply: {0}")]
    Decode(String),

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    /// Classifies this error for the pipeline. Timeouts stay timeouts;
    /// everything else means the backend is not usable right now.
    pub fn into_stage_error(self, operation: &str) -> StageError {
        match self {
            Self::Timeout(limit) => StageError::backend_timeout(operation, limit),
            other => StageError::backend_unavailable(operation, other.to_string()),
        }
    }
}

/// One prompt sent to the model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Model output for one [`CompletionRequest`].
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Generated token count, when the backend reports it.
    pub tokens: Option<u32>,
}

/// A text-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Backend family, for logs.
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    model: String,
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for a local Ollama server. No credentials are involved.
pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &BackendConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Connect(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: generate_endpoint(&config.url),
            model: config.model.clone(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else if err.is_decode() {
            LlmError::Decode(err.to_string())
        } else {
            LlmError::Connect(err.to_string())
        }
    }
}

fn generate_endpoint(base_url: &str) -> String {
    format!("{}/api/generate", base_url.trim_end_matches('/'))
}

/// Pulls the message out of an Ollama error body, falling back to the raw body.
fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body)
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = GenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: error_message(text),
            });
        }

        let reply: GenerateReply = response.json().await.map_err(|e| self.classify(e))?;
        debug!("{} generated {:?} tokens", reply.model, reply.eval_count);

        Ok(CompletionResponse {
            text: reply.response,
            model: reply.model,
            tokens: reply.eval_count,
        })
    }
}
