use std::time::Duration;

use ash_core::resilience::full_jitter_backoff;
use ash_core::{CircuitBreaker, CircuitState};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::wire::{ChatMessage, MessagesRequest, MessagesResponse};
use crate::FALLBACK_REPLY;

const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 4_000;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// HTTP client for the conversational LLM backend (spec §4.10, §6).
///
/// Same retry/circuit-breaker contract as [`ash_nlp::NlpClient`]. On failure
/// returns [`FALLBACK_REPLY`] rather than propagating an error, so a DM
/// session never shows the user a stack trace or error code.
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    retry_attempts: u32,
    breaker: CircuitBreaker,
}

impl LlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        retry_attempts: u32,
        circuit_breaker_failure_threshold: u32,
        circuit_breaker_cooldown_secs: u64,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(timeout_secs),
            retry_attempts,
            breaker: CircuitBreaker::new(
                circuit_breaker_failure_threshold,
                circuit_breaker_cooldown_secs,
            ),
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Send `system` + `messages` and return the assistant's reply, or
    /// [`FALLBACK_REPLY`] on failure.
    pub async fn complete(&self, system: &str, messages: &[ChatMessage]) -> String {
        match self.complete_inner(system, messages).await {
            Ok(reply) => reply,
            Err(e) => {
                metrics::counter!("llm_errors_total").increment(1);
                warn!(error = %e, "llm completion failed, returning fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn complete_inner(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        if !self.breaker.allow() {
            return Err(LlmError::CircuitOpen);
        }

        let body = MessagesRequest {
            model: &self.model,
            system,
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
        };
        let url = format!("{}/messages", self.base_url);

        let mut last_err = None;
        for attempt in 0..self.retry_attempts.max(1) {
            let outcome = self
                .http
                .post(&url)
                .timeout(self.timeout)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            let result = match outcome {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.json::<MessagesResponse>().await {
                            Ok(parsed) => Ok(parsed.content),
                            Err(e) => Err(LlmError::Http(e)),
                        }
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        Err(LlmError::Status {
                            status: status.as_u16(),
                            body,
                        })
                    }
                }
                Err(e) if e.is_timeout() => Err(LlmError::Timeout),
                Err(e) => Err(LlmError::Http(e)),
            };

            match result {
                Ok(reply) => {
                    self.breaker.record_success();
                    return Ok(reply);
                }
                Err(e) => {
                    self.breaker.record_failure();
                    let retryable = e.is_retryable() && attempt + 1 < self.retry_attempts;
                    if !retryable {
                        return Err(e);
                    }
                    let delay = full_jitter_backoff(attempt, BACKOFF_BASE_MS, BACKOFF_CAP_MS);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying llm call");
                    tokio::time::sleep(delay).await;
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(LlmError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_state_starts_closed() {
        let client = LlmClient::new("http://localhost:9", "key", "model", 1, 1, 5, 60);
        assert_eq!(client.circuit_state(), CircuitState::Closed);
    }
}
