//! [`AlertChannel`] implementation backed by a serenity `Http` REST client
//! (spec §4.8). Only REST, never the gateway — this is called from sweepers
//! and the dispatch path, both of which outlive any single gateway session.

use std::sync::Arc;

use ash_alerts::{AlertChannel, AlertEmbedSpec, AlertError, ControlAction};
use ash_core::{ChannelId, MessageId};
use async_trait::async_trait;
use serenity::builder::{CreateMessage, EditMessage};
use serenity::http::Http;
use serenity::model::id::{ChannelId as SerenityChannelId, MessageId as SerenityMessageId, RoleId, UserId as SerenityUserId};
use tracing::warn;

use crate::controls::build_action_row;
use crate::embed::{build_alert_embed, mark_auto_initiated, mark_user_opted_out};

fn parse_channel_id(id: &ChannelId) -> Result<SerenityChannelId, AlertError> {
    id.as_ref()
        .parse::<u64>()
        .map(SerenityChannelId::new)
        .map_err(|_| AlertError::ChannelUnavailable)
}

fn parse_message_id(id: &MessageId) -> Result<SerenityMessageId, AlertError> {
    id.as_ref()
        .parse::<u64>()
        .map(SerenityMessageId::new)
        .map_err(|_| AlertError::ChannelUnavailable)
}

pub struct DiscordAlertChannel {
    http: Arc<Http>,
    crt_role_id: RoleId,
    crt_lead_user_id: Option<SerenityUserId>,
}

impl DiscordAlertChannel {
    pub fn new(http: Arc<Http>, crt_role_id: RoleId, crt_lead_user_id: Option<SerenityUserId>) -> Self {
        Self {
            http,
            crt_role_id,
            crt_lead_user_id,
        }
    }
}

#[async_trait]
impl AlertChannel for DiscordAlertChannel {
    async fn post_alert(
        &self,
        channel_id: &ChannelId,
        spec: &AlertEmbedSpec,
        controls: &[ControlAction],
        ping_crt: bool,
    ) -> Result<MessageId, AlertError> {
        let target = parse_channel_id(channel_id)?;
        let embed = build_alert_embed(spec);

        // The action row's custom_ids need the alert message id, which we
        // don't have until after the message is sent — post once without
        // controls, then edit in the row now that we know our own id.
        let mut message = CreateMessage::new().embed(embed.clone());
        if ping_crt {
            message = message.content(format!("<@&{}>", self.crt_role_id));
        }

        let sent = target
            .send_message(&self.http, message)
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to post alert embed");
                AlertError::ChannelUnavailable
            })?;

        let alert_id = MessageId::from(sent.id.to_string());
        if !controls.is_empty() {
            let row = build_action_row(controls, alert_id.as_ref());
            let edit = EditMessage::new().embed(embed).components(vec![row]);
            if let Err(e) = target.edit_message(&self.http, sent.id, edit).await {
                warn!(error = %e, "failed to attach controls to alert embed");
            }
        }

        Ok(alert_id)
    }

    async fn dm_crt_lead(&self, spec: &AlertEmbedSpec) -> Result<(), AlertError> {
        let Some(lead) = self.crt_lead_user_id else {
            return Err(AlertError::DmFailed);
        };
        let dm = lead
            .create_dm_channel(&self.http)
            .await
            .map_err(|_| AlertError::DmFailed)?;
        let embed = build_alert_embed(spec);
        dm.send_message(&self.http, CreateMessage::new().embed(embed))
            .await
            .map_err(|_| AlertError::DmFailed)?;
        Ok(())
    }

    async fn mark_auto_initiated(
        &self,
        channel_id: &ChannelId,
        alert_message_id: &MessageId,
    ) -> Result<(), AlertError> {
        let channel = parse_channel_id(channel_id)?;
        let message_id = parse_message_id(alert_message_id)?;
        let existing = channel
            .message(&self.http, message_id)
            .await
            .map_err(|_| AlertError::ChannelUnavailable)?;
        let embed = existing
            .embeds
            .first()
            .cloned()
            .map(serenity::builder::CreateEmbed::from)
            .unwrap_or_default();
        let edit = EditMessage::new().embed(mark_auto_initiated(embed));
        channel
            .edit_message(&self.http, message_id, edit)
            .await
            .map_err(|_| AlertError::ChannelUnavailable)?;
        Ok(())
    }

    async fn mark_user_opted_out(
        &self,
        channel_id: &ChannelId,
        alert_message_id: &MessageId,
    ) -> Result<(), AlertError> {
        let channel = parse_channel_id(channel_id)?;
        let message_id = parse_message_id(alert_message_id)?;
        let existing = channel
            .message(&self.http, message_id)
            .await
            .map_err(|_| AlertError::ChannelUnavailable)?;
        let embed = existing
            .embeds
            .first()
            .cloned()
            .map(serenity::builder::CreateEmbed::from)
            .unwrap_or_default();
        let edit = EditMessage::new().embed(mark_user_opted_out(embed));
        channel
            .edit_message(&self.http, message_id, edit)
            .await
            .map_err(|_| AlertError::ChannelUnavailable)?;
        Ok(())
    }
}
