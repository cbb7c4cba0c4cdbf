use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, GuildId, MessageId, UserId};
use crate::severity::Severity;

/// A single monitored message, retained in the per-user history window.
///
/// Timestamps are Unix seconds: history is stored in a Redis sorted set
/// keyed on `timestamp`, so the field doubles as the sort/expiry score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub text: String,
    pub timestamp: i64,
    pub crisis_score: f64,
    pub severity: Severity,
    pub external_message_id: Option<MessageId>,
}

impl StoredMessage {
    pub const MAX_TEXT_LEN: usize = 500;

    /// Truncate `text` to [`Self::MAX_TEXT_LEN`] chars on a char boundary.
    pub fn truncate_text(text: &str) -> String {
        if text.chars().count() <= Self::MAX_TEXT_LEN {
            return text.to_string();
        }
        text.chars().take(Self::MAX_TEXT_LEN).collect()
    }
}

/// Opt-out preference record. `expires_at` bounds the opt-out itself
/// (matching the key's own TTL so an expired key and an expired record
/// agree); absence of the key is equivalent to `opted_out = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: UserId,
    pub opted_out: bool,
    pub opted_out_at: i64,
    pub expires_at: i64,
}

impl UserPreference {
    pub fn new(user_id: UserId, now: i64, ttl_secs: i64) -> Self {
        Self {
            user_id,
            opted_out: true,
            opted_out_at: now,
            expires_at: now + ttl_secs,
        }
    }

    pub fn is_active(&self, now: i64) -> bool {
        self.opted_out && self.expires_at > now
    }
}

/// A crisis alert posted to a CRT channel, awaiting acknowledgement or
/// auto-initiation. Keyed in KV and in the Auto-Initiate Manager's
/// in-memory map by `alert_message_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAlert {
    pub alert_message_id: MessageId,
    pub alert_channel_id: ChannelId,
    pub user_id: UserId,
    pub guild_id: Option<GuildId>,
    pub original_message_id: Option<MessageId>,
    pub original_channel_id: ChannelId,
    pub severity: Severity,
    pub created_at: i64,
    pub expires_at: i64,
    pub acknowledged: bool,
}

/// An Ash companion conversation, single-live-per-user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub started_at: i64,
    pub last_activity_at: i64,
    pub severity_at_start: Severity,
    pub turn_count: u32,
    pub handed_off_to: Option<UserId>,
    pub ended_at: Option<i64>,
    /// Alert that triggered this session, if any, so an opt-out reaction can
    /// annotate the originating alert embed (§4.11).
    pub source_alert_id: Option<MessageId>,
    pub source_alert_channel_id: Option<ChannelId>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none() && self.handed_off_to.is_none()
    }
}

/// A scheduled follow-up DM, fired by the Check-In sweeper at-most-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub user_id: UserId,
    pub scheduled_for: i64,
    pub source_alert_id: Option<MessageId>,
    pub delivered: bool,
}

/// Result of classifying a single message through the NLP pipeline.
/// Immutable after construction.
///
/// `original_score`/`sensitivity` are carried alongside the thresholds-
/// derived `crisis_score` so that alert embeds and audit logs can show both
/// the raw model output and the per-channel sensitivity that was applied to
/// reach the final severity (§4.6 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NLPResult {
    pub crisis_score: f64,
    pub severity: Severity,
    pub categories: Vec<String>,
    pub confidence: f64,
    pub model_agreement: String,
    pub gaps_detected: bool,
    pub reasoning: Option<String>,
    pub original_score: f64,
    pub sensitivity: f64,
}

impl NLPResult {
    /// `nlp_unavailable` sentinel returned by the NLP client on failure, so
    /// callers fail open to no-alert rather than raising to the event loop.
    pub fn unavailable_sentinel() -> Self {
        Self {
            crisis_score: 0.0,
            severity: Severity::Safe,
            categories: Vec::new(),
            confidence: 0.0,
            model_agreement: "unavailable".to_string(),
            gaps_detected: false,
            reasoning: Some("nlp_unavailable".to_string()),
            original_score: 0.0,
            sensitivity: 1.0,
        }
    }

    /// Apply a sensitivity multiplier to a raw model score, clamped to
    /// `[0,1]`.
    pub fn apply_sensitivity(original_score: f64, sensitivity: f64) -> f64 {
        (original_score * sensitivity).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        let long = "a".repeat(600);
        let truncated = StoredMessage::truncate_text(&long);
        assert_eq!(truncated.chars().count(), StoredMessage::MAX_TEXT_LEN);
    }

    #[test]
    fn short_text_is_unchanged() {
        let short = "hello";
        assert_eq!(StoredMessage::truncate_text(short), short);
    }

    #[test]
    fn apply_sensitivity_clamps_to_unit_range() {
        assert_eq!(NLPResult::apply_sensitivity(0.9, 2.0), 1.0);
        assert_eq!(NLPResult::apply_sensitivity(0.9, 0.0), 0.0);
        assert!((NLPResult::apply_sensitivity(0.5, 0.5) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn opt_out_expires() {
        let pref = UserPreference::new(UserId::from("u1"), 1_000, 60);
        assert!(pref.is_active(1_030));
        assert!(!pref.is_active(1_100));
    }

    #[test]
    fn unavailable_sentinel_fails_open() {
        let sentinel = NLPResult::unavailable_sentinel();
        assert_eq!(sentinel.severity, Severity::Safe);
        assert_eq!(sentinel.reasoning.as_deref(), Some("nlp_unavailable"));
    }
}
