use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("llm returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("llm circuit breaker open")]
    CircuitOpen,

    #[error("llm request timed out")]
    Timeout,
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect(),
            LlmError::Status { status, .. } => *status >= 500,
            LlmError::Timeout => true,
            LlmError::CircuitOpen => false,
        }
    }
}
