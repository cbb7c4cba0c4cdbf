use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error(transparent)]
    Kv(#[from] ash_kv::KvError),

    #[error("alert channel adapter unavailable")]
    ChannelUnavailable,

    #[error("failed to dm crt lead")]
    DmFailed,
}
