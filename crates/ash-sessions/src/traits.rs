use async_trait::async_trait;

use ash_core::{ChannelId, MessageId, Severity, UserId};

use crate::error::SessionError;

/// Chat-platform facing surface the Session Manager needs to run a DM
/// conversation, without depending on a specific gateway crate.
#[async_trait]
pub trait SessionChannel: Send + Sync {
    async fn open_dm(&self, user_id: &UserId) -> Result<ChannelId, SessionError>;

    /// Send the severity-shaped welcome message and return its id, so the
    /// caller can register it for ❌-reaction opt-out attribution (§4.11).
    async fn send_welcome(
        &self,
        channel_id: &ChannelId,
        severity: Severity,
    ) -> Result<MessageId, SessionError>;

    async fn send_reply(&self, channel_id: &ChannelId, text: &str) -> Result<(), SessionError>;

    async fn send_handoff_notice(
        &self,
        channel_id: &ChannelId,
        crt_member: &UserId,
    ) -> Result<(), SessionError>;

    async fn send_opt_out_ack(&self, channel_id: &ChannelId) -> Result<(), SessionError>;

    async fn send_check_in(&self, channel_id: &ChannelId) -> Result<(), SessionError>;
}

/// Lets the Session Manager annotate an alert embed on opt-out without
/// `ash-sessions` depending on `ash-alerts`. Implemented by `AlertDispatcher`.
#[async_trait]
pub trait AlertAnnotator: Send + Sync {
    async fn annotate_user_opted_out(&self, alert_channel_id: &ChannelId, alert_message_id: &MessageId);
}
