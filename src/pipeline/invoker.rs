//! Model invocation with bounded retries.
//!
//! An attempt succeeds only when the backend answers *and* its text contains
//! a parseable JSON object. Transport errors, bad statuses and unusable text
//! all spend from the same attempt budget.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::llm::provider::{CompletionRequest, FinishReason, LlmProvider};
use crate::llm::retry::RetryPolicy;
use crate::pipeline::extract::extract_json_object;

/// Calls one backend until it yields a JSON object or the budget runs out.
pub struct ModelInvoker {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl ModelInvoker {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Run the request, returning the extracted object.
    ///
    /// Fails with `BackendUnavailable` after `max_attempts` failed attempts.
    pub async fn invoke(
        &self,
        request: &CompletionRequest,
    ) -> Result<Map<String, Value>, PipelineError> {
        let model = self.provider.model_name();
        let mut last_error = String::new();

        for attempt in 0..self.policy.max_attempts {
            debug!(model, attempt = attempt + 1, "Invoking model");

            let outcome = match self.provider.complete(request.clone()).await {
                Ok(response) => {
                    debug!(
                        model,
                        attempt = attempt + 1,
                        input_tokens = response.input_tokens,
                        output_tokens = response.output_tokens,
                        finish_reason = ?response.finish_reason,
                        "Model responded"
                    );
                    extract_json_object(&response.content).map_err(|e| {
                        if response.finish_reason == FinishReason::Length {
                            warn!(
                                model,
                                attempt = attempt + 1,
                                output_tokens = response.output_tokens,
                                "Model output hit the token limit"
                            );
                        }
                        warn!(
                            model,
                            attempt = attempt + 1,
                            raw_response = %response.content,
                            error = %e,
                            "Model output had no usable JSON object"
                        );
                        e.to_string()
                    })
                }
                Err(e) => {
                    warn!(model, attempt = attempt + 1, error = %e, "Model call failed");
                    Err(e.to_string())
                }
            };

            match outcome {
                Ok(object) => return Ok(object),
                Err(reason) => last_error = reason,
            }

            if let Some(delay) = self.policy.delay_after(attempt) {
                debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        Err(PipelineError::BackendUnavailable {
            attempts: self.policy.max_attempts,
            reason: last_error,
        })
    }
}
