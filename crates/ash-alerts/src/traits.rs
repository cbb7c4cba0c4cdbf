use async_trait::async_trait;

use ash_core::{ChannelId, MessageId, Severity, UserId};

use crate::error::AlertError;
use crate::types::{AlertEmbedSpec, ControlAction};

/// Chat-platform facing surface the Alert Dispatcher needs. Implemented by
/// the Discord adapter; a test double backs unit tests so dispatcher logic
/// never has to talk to a real gateway.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn post_alert(
        &self,
        channel_id: &ChannelId,
        spec: &AlertEmbedSpec,
        controls: &[ControlAction],
        ping_crt: bool,
    ) -> Result<MessageId, AlertError>;

    async fn dm_crt_lead(&self, spec: &AlertEmbedSpec) -> Result<(), AlertError>;

    /// Edit a previously-posted alert to a purple "Auto-initiated (no staff
    /// response)" accent (spec §4.9 sweeper step).
    async fn mark_auto_initiated(
        &self,
        channel_id: &ChannelId,
        alert_message_id: &MessageId,
    ) -> Result<(), AlertError>;

    /// Edit a previously-posted alert to note the user opted out before
    /// staff responded (spec §4.11 opt-out-via-reaction).
    async fn mark_user_opted_out(
        &self,
        channel_id: &ChannelId,
        alert_message_id: &MessageId,
    ) -> Result<(), AlertError>;
}

/// Handle back into the Session Manager, used by the Auto-Initiate sweeper
/// to start a DM session without `ash-alerts` depending on `ash-sessions`.
#[async_trait]
pub trait SessionInitiator: Send + Sync {
    /// Returns `true` iff a session was started or already existed.
    async fn initiate(
        &self,
        user_id: &UserId,
        severity: Severity,
        source_alert_id: Option<MessageId>,
        source_alert_channel_id: Option<ChannelId>,
    ) -> bool;
}
