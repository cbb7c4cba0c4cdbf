use thiserror::Error;

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("nlp request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("nlp returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("nlp circuit breaker open")]
    CircuitOpen,

    #[error("nlp request timed out")]
    Timeout,
}

impl NlpError {
    /// Idempotent transport errors are retryable per spec §4.5: connection
    /// reset, 5xx, timeout. 4xx (other than transport-level) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            NlpError::Http(e) => e.is_timeout() || e.is_connect(),
            NlpError::Status { status, .. } => *status >= 500,
            NlpError::Timeout => true,
            NlpError::CircuitOpen => false,
        }
    }
}
