use thiserror::Error;

/// Top-level error used only by wiring code (`ash-gateway`) that must unify
/// errors raised across crates. Inner crates define their own focused error
/// enums (`KvError`, `NlpError`, `LlmError`, …) and are not expected to
/// convert into this type except at the wiring boundary.
#[derive(Debug, Error)]
pub enum AshError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("fatal startup error: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AshError {
    pub fn code(&self) -> &'static str {
        match self {
            AshError::Config(_) => "CONFIG_ERROR",
            AshError::AuthFailed(_) => "AUTH_FAILED",
            AshError::Fatal(_) => "FATAL",
            AshError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, AshError>;
