use ash_core::types::NLPResult;
use ash_core::{ChannelId, GuildId, MessageId, Severity, UserId};
use serde::{Deserialize, Serialize};

/// An interactive control attached to an alert embed (spec §4.8 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Acknowledge,
    TalkToAsh,
    History,
}

impl ControlAction {
    /// Parse the `[alerts].controls` config strings, skipping and warning on
    /// anything unrecognised rather than failing startup over a typo.
    pub fn parse_config_list(values: &[String]) -> Vec<Self> {
        values
            .iter()
            .filter_map(|v| match v.as_str() {
                "acknowledge" => Some(Self::Acknowledge),
                "talk_to_ash" => Some(Self::TalkToAsh),
                "history" => Some(Self::History),
                other => {
                    tracing::warn!(control = other, "unknown alert control in config, skipping");
                    None
                }
            })
            .collect()
    }
}

/// Everything the Alert Dispatcher needs to evaluate and, if warranted,
/// post an alert for a single classified message.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub user_id: UserId,
    pub guild_id: Option<GuildId>,
    pub original_message_id: Option<MessageId>,
    pub original_channel_id: ChannelId,
    pub target_channel: ChannelId,
    pub ping_crt: bool,
    pub text: String,
    pub nlp: NLPResult,
    pub opted_out: bool,
}

/// Rendered content for an alert embed, handed to the chat-platform adapter
/// for actual embed/button construction (spec §4.8 step 2).
#[derive(Debug, Clone)]
pub struct AlertEmbedSpec {
    pub user_id: UserId,
    pub severity: Severity,
    pub truncated_text: String,
    pub crisis_score: f64,
    pub categories: Vec<String>,
    pub confidence: f64,
    pub opted_out: bool,
    pub original_message_id: Option<MessageId>,
    pub original_channel_id: ChannelId,
}

/// Outcome of a single dispatch attempt, returned to the caller (classifier
/// event loop) so message ingestion never blocks on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    NoAlert,
    Suppressed,
    Sent { alert_message_id: MessageId },
    FellBackToDm,
    Dropped,
}
