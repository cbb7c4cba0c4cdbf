use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis connection unavailable")]
    ConnectionUnavailable,

    #[error("redis command {operation} failed: {source}")]
    Command {
        operation: &'static str,
        #[source]
        source: redis::RedisError,
    },

    #[error("failed to decode json from redis: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid redis url: {0}")]
    InvalidUrl(redis::RedisError),

    #[error("redis operation {operation} timed out after {deadline_secs}s")]
    Timeout {
        operation: &'static str,
        deadline_secs: u64,
    },
}

impl KvError {
    pub fn code(&self) -> &'static str {
        match self {
            KvError::ConnectionUnavailable => "KV_CONNECTION_UNAVAILABLE",
            KvError::Command { .. } => "KV_COMMAND_FAILED",
            KvError::Decode(_) => "KV_DECODE_ERROR",
            KvError::InvalidUrl(_) => "KV_INVALID_URL",
            KvError::Timeout { .. } => "KV_TIMEOUT",
        }
    }
}

pub type Result<T> = std::result::Result<T, KvError>;
