//! [`SessionChannel`] implementation backed by a serenity `Http` REST client
//! (spec §4.11, §4.12). DM delivery only ever needs REST, never the gateway.

use std::sync::Arc;

use ash_core::{ChannelId, MessageId, Severity, UserId};
use ash_sessions::{SessionChannel, SessionError};
use async_trait::async_trait;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::UserId as SerenityUserId;
use tracing::warn;

use crate::embed::welcome_message;

/// DM delivery for the Session Manager and Check-In Scheduler. The welcome
/// message's id is handed back to the caller (spec §4.11) — registering it
/// against the sending user for ❌-reaction attribution happens in
/// `handler.rs`, which is the only place that knows both the message id and
/// the Discord user it was sent to.
pub struct DiscordSessionChannel {
    http: Arc<Http>,
}

impl DiscordSessionChannel {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    fn parse_user(user_id: &UserId) -> Result<SerenityUserId, SessionError> {
        user_id
            .as_ref()
            .parse::<u64>()
            .map(SerenityUserId::new)
            .map_err(|_| SessionError::ChannelUnavailable)
    }
}

#[async_trait]
impl SessionChannel for DiscordSessionChannel {
    async fn open_dm(&self, user_id: &UserId) -> Result<ChannelId, SessionError> {
        let discord_user = Self::parse_user(user_id)?;
        let dm = discord_user
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| {
                warn!(error = %e, %user_id, "failed to open dm channel");
                SessionError::ChannelUnavailable
            })?;
        Ok(ChannelId::from(dm.id.to_string()))
    }

    async fn send_welcome(
        &self,
        channel_id: &ChannelId,
        severity: Severity,
    ) -> Result<MessageId, SessionError> {
        let target = channel_id
            .as_ref()
            .parse::<u64>()
            .map(serenity::model::id::ChannelId::new)
            .map_err(|_| SessionError::ChannelUnavailable)?;
        let sent = target
            .send_message(
                &self.http,
                CreateMessage::new().content(welcome_message(severity)),
            )
            .await
            .map_err(|_| SessionError::ChannelUnavailable)?;
        Ok(MessageId::from(sent.id.to_string()))
    }

    async fn send_reply(&self, channel_id: &ChannelId, text: &str) -> Result<(), SessionError> {
        self.say(channel_id, text).await
    }

    async fn send_handoff_notice(
        &self,
        channel_id: &ChannelId,
        crt_member: &UserId,
    ) -> Result<(), SessionError> {
        self.say(
            channel_id,
            &format!("A member of our crisis response team (<@{crt_member}>) is joining this conversation."),
        )
        .await
    }

    async fn send_opt_out_ack(&self, channel_id: &ChannelId) -> Result<(), SessionError> {
        self.say(
            channel_id,
            "Understood — I won't reach out directly again unless you ask. Take care of yourself.",
        )
        .await
    }

    async fn send_check_in(&self, channel_id: &ChannelId) -> Result<(), SessionError> {
        self.say(
            channel_id,
            "Hey, it's Ash again. Just checking in since we talked yesterday — how are you doing?",
        )
        .await
    }
}

impl DiscordSessionChannel {
    async fn say(&self, channel_id: &ChannelId, text: &str) -> Result<(), SessionError> {
        let target = channel_id
            .as_ref()
            .parse::<u64>()
            .map(serenity::model::id::ChannelId::new)
            .map_err(|_| SessionError::ChannelUnavailable)?;
        target
            .send_message(&self.http, CreateMessage::new().content(text))
            .await
            .map_err(|_| SessionError::ChannelUnavailable)?;
        Ok(())
    }
}
