use ash_core::types::StoredMessage;
use ash_core::Severity;
use ash_kv::{keys, KvStore};
use tracing::warn;

/// Per-`(guild, user)` ordered message history with a severity floor, a
/// message-count cap, and a refreshed TTL (spec §4.3).
///
/// All operations fail-soft: a KV outage is logged and treated as "no
/// history" rather than propagated, so a flaky store can never block message
/// ingestion or the classifier pipeline.
#[derive(Clone)]
pub struct HistoryStore {
    kv: KvStore,
    ttl_secs: u64,
    max_messages: usize,
    min_severity: Severity,
}

impl HistoryStore {
    pub fn new(kv: KvStore, ttl_days: u32, max_messages: usize, min_severity: Severity) -> Self {
        Self {
            kv,
            ttl_secs: u64::from(ttl_days) * 86_400,
            max_messages,
            min_severity,
        }
    }

    /// Insert `message` for `(guild_id, user_id)`. Returns `false` without
    /// touching the store if `message.severity` is below the configured
    /// floor (invariant: `SAFE` is never persisted) or if the KV store is
    /// unavailable.
    pub async fn insert(&self, guild_id: &str, user_id: &str, mut message: StoredMessage) -> bool {
        if message.severity < self.min_severity {
            return false;
        }
        message.text = StoredMessage::truncate_text(&message.text);

        let key = keys::history_key(guild_id, user_id);
        let member = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode history entry, dropping");
                return false;
            }
        };

        match self
            .kv
            .zadd_capped(
                &key,
                &member,
                message.timestamp,
                self.max_messages as isize,
                Some(self.ttl_secs),
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(guild_id, user_id, error = %e, "history insert failed, continuing without it");
                false
            }
        }
    }

    /// Newest-first history for `(guild_id, user_id)`, capped at `limit`.
    /// Returns an empty vec (and logs) on KV failure or decode errors.
    pub async fn get_history(&self, guild_id: &str, user_id: &str, limit: usize) -> Vec<StoredMessage> {
        let key = keys::history_key(guild_id, user_id);
        let raw = match self.kv.zrevrange(&key, limit as isize).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(guild_id, user_id, error = %e, "history fetch failed, treating as empty");
                return Vec::new();
            }
        };

        raw.into_iter()
            .filter_map(|entry| match serde_json::from_str::<StoredMessage>(&entry) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!(error = %e, "dropping malformed history entry");
                    None
                }
            })
            .collect()
    }

    /// Current entry count for `(guild_id, user_id)`, or `0` on failure.
    pub async fn count(&self, guild_id: &str, user_id: &str) -> usize {
        let key = keys::history_key(guild_id, user_id);
        self.kv.zcard(&key).await.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(severity: Severity, ts: i64) -> StoredMessage {
        StoredMessage {
            text: "hello".to_string(),
            timestamp: ts,
            crisis_score: 0.5,
            severity,
            external_message_id: None,
        }
    }

    #[test]
    fn truncation_applies_before_storage() {
        let long = "x".repeat(600);
        let mut msg = sample(Severity::Medium, 1);
        msg.text = long;
        let truncated = StoredMessage::truncate_text(&msg.text);
        assert_eq!(truncated.chars().count(), StoredMessage::MAX_TEXT_LEN);
    }

    #[test]
    fn safe_severity_is_below_default_floor() {
        assert!(Severity::Safe < Severity::Low);
    }
}
