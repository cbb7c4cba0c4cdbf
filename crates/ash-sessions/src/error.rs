use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Kv(#[from] ash_kv::KvError),

    #[error("user has opted out of direct support")]
    UserOptedOut,

    #[error("chat platform adapter unavailable")]
    ChannelUnavailable,
}
