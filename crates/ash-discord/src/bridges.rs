//! Narrow adapters that satisfy `ash-alerts`' and `ash-sessions`' bridging
//! traits without either crate depending on the other (spec §4.9, §4.11).
//! Both managers are assembled in `ash-gateway`'s wiring and handed to each
//! other only through these traits.

use std::sync::Arc;

use ash_alerts::{AlertDispatcher, SessionInitiator};
use ash_core::{ChannelId, MessageId, Severity, UserId};
use ash_sessions::{AlertAnnotator, SessionManager};
use async_trait::async_trait;
use tracing::warn;

use crate::welcome_map::WelcomeMap;

/// Lets the Auto-Initiate Manager start a DM session without `ash-alerts`
/// depending on `ash-sessions`.
pub struct SessionManagerInitiator {
    pub sessions: Arc<SessionManager>,
    pub welcome_map: Arc<WelcomeMap>,
}

#[async_trait]
impl SessionInitiator for SessionManagerInitiator {
    async fn initiate(
        &self,
        user_id: &UserId,
        severity: Severity,
        source_alert_id: Option<MessageId>,
        source_alert_channel_id: Option<ChannelId>,
    ) -> bool {
        let now = chrono::Utc::now().timestamp();
        let origin = match (source_alert_id, source_alert_channel_id) {
            (Some(alert_message_id), Some(alert_channel_id)) => Some(ash_sessions::SessionOrigin {
                alert_message_id,
                alert_channel_id,
            }),
            _ => None,
        };

        match self.sessions.start(user_id, severity, origin, true, now).await {
            Ok(outcome) => {
                if let Some(welcome_message_id) = outcome.welcome_message_id {
                    self.welcome_map.register(welcome_message_id, user_id.clone());
                }
                true
            }
            Err(e) => {
                warn!(error = %e, %user_id, "auto-initiate failed to start session");
                false
            }
        }
    }
}

/// Lets the Session Manager annotate an alert embed on opt-out without
/// `ash-sessions` depending on `ash-alerts`.
pub struct AlertDispatcherAnnotator {
    pub dispatcher: Arc<AlertDispatcher>,
}

#[async_trait]
impl AlertAnnotator for AlertDispatcherAnnotator {
    async fn annotate_user_opted_out(&self, alert_channel_id: &ChannelId, alert_message_id: &MessageId) {
        self.dispatcher
            .annotate_opted_out(alert_channel_id, alert_message_id)
            .await;
    }
}
