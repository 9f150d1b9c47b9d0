//! Ollama provider using the `/api/generate` API.
//!
//! `/api/generate` takes a single prompt string, so system messages are
//! folded into the prompt under a `**SYSTEM INSTRUCTIONS**:` header.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{
    check_http_response, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use crate::error::LlmError;

const PROVIDER: &str = "ollama";

/// Nucleus sampling passed on every request.
const TOP_P: f32 = 0.9;

// ── Wire types ──────────────────────────────────────────────────────

/// `/api/generate` request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

/// Sampling options.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// `/api/generate` response body (non-streaming).
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

// ── Provider ────────────────────────────────────────────────────────

/// Self-hosted Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// `url` is the full generate endpoint, e.g. `http://localhost:11434/api/generate`.
    pub fn new(url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            url: url.to_string(),
            model: model.to_string(),
            client,
        })
    }
}

/// Flatten a request into the single prompt `/api/generate` expects.
#[doc(hidden)]
pub fn build_prompt(request: &CompletionRequest) -> String {
    let user = request.user_text();
    match request.system_text() {
        Some(system) => format!("**SYSTEM INSTRUCTIONS**:\n{system}\n\n{user}"),
        None => user,
    }
}

#[doc(hidden)]
pub fn build_request(model: &str, request: &CompletionRequest) -> GenerateRequest {
    GenerateRequest {
        model: model.to_string(),
        prompt: build_prompt(request),
        stream: false,
        options: GenerateOptions {
            temperature: request.temperature,
            top_p: TOP_P,
            num_predict: request.max_tokens,
        },
    }
}

/// Parse a response body. A missing `response` field is an invalid response.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, LlmError> {
    let resp: GenerateResponse = serde_json::from_str(body)?;
    let content = resp.response.ok_or_else(|| LlmError::InvalidResponse {
        provider: PROVIDER.to_string(),
        reason: "missing `response` field".to_string(),
    })?;

    let finish_reason = match resp.done_reason.as_deref() {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        _ => FinishReason::Unknown,
    };

    Ok(CompletionResponse {
        content,
        input_tokens: resp.prompt_eval_count.unwrap_or(0),
        output_tokens: resp.eval_count.unwrap_or(0),
        finish_reason,
    })
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = build_request(&self.model, &request);

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let text = check_http_response(PROVIDER, response).await?;
        parse_response(&text)
    }
}
