use std::time::Duration;

use ash_core::resilience::full_jitter_backoff;
use ash_core::types::{NLPResult, StoredMessage};
use ash_core::{CircuitBreaker, CircuitState};
use tracing::{debug, warn};

use crate::error::NlpError;
use crate::wire::{AnalyzeRequest, AnalyzeResponse};

const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 4_000;

/// HTTP client for the external NLP classifier (spec §4.5, §6).
///
/// On any failure — timeout, exhausted retries, open circuit — `analyze`
/// returns the `nlp_unavailable` sentinel rather than propagating an error,
/// so the classifier pipeline always fails open to no-alert (never raises to
/// the event loop).
pub struct NlpClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry_attempts: u32,
    breaker: CircuitBreaker,
}

impl NlpClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout_secs: u64,
        retry_attempts: u32,
        circuit_breaker_failure_threshold: u32,
        circuit_breaker_cooldown_secs: u64,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
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

    /// Classify `text` given recent `history`. Never returns `Err` to the
    /// caller — on any failure it returns [`NLPResult::unavailable_sentinel`]
    /// and records `nlp_errors_total`.
    pub async fn analyze(
        &self,
        text: &str,
        user_id: &str,
        channel_id: &str,
        history: &[StoredMessage],
    ) -> NLPResult {
        match self.analyze_inner(text, user_id, channel_id, history).await {
            Ok(resp) => NLPResult {
                crisis_score: resp.crisis_score,
                severity: resp.severity,
                categories: resp.categories,
                confidence: resp.confidence,
                model_agreement: resp.model_agreement,
                gaps_detected: resp.gaps_detected,
                reasoning: resp.reasoning,
                original_score: resp.crisis_score,
                sensitivity: 1.0,
            },
            Err(e) => {
                metrics::counter!("nlp_errors_total").increment(1);
                warn!(error = %e, "nlp classification failed, failing open to SAFE");
                NLPResult::unavailable_sentinel()
            }
        }
    }

    async fn analyze_inner(
        &self,
        text: &str,
        user_id: &str,
        channel_id: &str,
        history: &[StoredMessage],
    ) -> Result<AnalyzeResponse, NlpError> {
        if !self.breaker.allow() {
            return Err(NlpError::CircuitOpen);
        }

        let body = AnalyzeRequest {
            text,
            user_id,
            channel_id,
            history: history.iter().map(Into::into).collect(),
        };
        let url = format!("{}/analyze", self.base_url);

        let mut last_err = None;
        for attempt in 0..self.retry_attempts.max(1) {
            let started = std::time::Instant::now();
            let outcome = self.http.post(&url).timeout(self.timeout).json(&body).send().await;

            let result = match outcome {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.json::<AnalyzeResponse>().await {
                            Ok(parsed) => Ok(parsed),
                            Err(e) => Err(NlpError::Http(e)),
                        }
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        Err(NlpError::Status {
                            status: status.as_u16(),
                            body,
                        })
                    }
                }
                Err(e) if e.is_timeout() => Err(NlpError::Timeout),
                Err(e) => Err(NlpError::Http(e)),
            };

            metrics::histogram!("nlp_request_duration_seconds").record(started.elapsed().as_secs_f64());

            match result {
                Ok(parsed) => {
                    self.breaker.record_success();
                    return Ok(parsed);
                }
                Err(e) => {
                    self.breaker.record_failure();
                    let retryable = e.is_retryable() && attempt + 1 < self.retry_attempts;
                    if !retryable {
                        return Err(e);
                    }
                    let delay = full_jitter_backoff(attempt, BACKOFF_BASE_MS, BACKOFF_CAP_MS);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying nlp call");
                    tokio::time::sleep(delay).await;
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(NlpError::Timeout))
    }

    /// `GET {base}/health` for the readiness probe.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        matches!(
            self.http.get(&url).timeout(Duration::from_secs(5)).send().await,
            Ok(resp) if resp.status().is_success()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_state_starts_closed() {
        let client = NlpClient::new("http://localhost:9", 1, 1, 5, 60);
        assert_eq!(client.circuit_state(), CircuitState::Closed);
    }
}
