use std::sync::Arc;

use ash_core::types::{NLPResult, StoredMessage};
use ash_core::{GuildId, Severity, SeverityThresholds, UserId};
use ash_history::HistoryStore;
use ash_nlp::NlpClient;
use ash_policy::{ChannelPolicy, RouteDecision};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

const HISTORY_LOOKBACK: usize = 20;

/// Result of running one message through the classifier pipeline (spec §4.6).
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub result: NLPResult,
    pub route: RouteDecision,
}

/// Attaches history + channel sensitivity to the raw NLP result and turns it
/// into a routing decision.
///
/// Per-user serialization (so the classifier sees history that is a prefix
/// of all strictly earlier accepted messages for the same user) is a
/// `DashMap<UserId, Arc<Mutex<()>>>` guard map — the same idiom used for
/// per-key handle maps elsewhere in the stack — rather than one global lock,
/// so unrelated users classify in parallel.
pub struct ClassifierPipeline {
    history: HistoryStore,
    nlp: NlpClient,
    policy: Arc<ChannelPolicy>,
    thresholds: SeverityThresholds,
    user_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl ClassifierPipeline {
    pub fn new(
        history: HistoryStore,
        nlp: NlpClient,
        policy: Arc<ChannelPolicy>,
        thresholds: SeverityThresholds,
    ) -> Self {
        Self {
            history,
            nlp,
            policy,
            thresholds,
            user_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Classify one accepted message. Sequential per `user_id`, parallel
    /// across users.
    pub async fn classify(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
        channel_id: &str,
        text: &str,
        timestamp: i64,
    ) -> ClassificationOutcome {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let text = StoredMessage::truncate_text(text);

        let history = self
            .history
            .get_history(guild_id.as_ref(), user_id.as_ref(), HISTORY_LOOKBACK)
            .await;

        let raw = self
            .nlp
            .analyze(&text, user_id.as_ref(), channel_id, &history)
            .await;

        let result = self.apply_sensitivity(raw, channel_id);

        if result.severity >= Severity::Low {
            let entry = StoredMessage {
                text,
                timestamp,
                crisis_score: result.crisis_score,
                severity: result.severity,
                external_message_id: None,
            };
            let history_store = self.history.clone();
            let guild = guild_id.clone();
            let user = user_id.clone();
            tokio::spawn(async move {
                history_store.insert(guild.as_ref(), user.as_ref(), entry).await;
            });
        }

        metrics::counter!("messages_analyzed_total", "severity" => result.severity.as_str())
            .increment(1);

        let route = self.policy.route(result.severity);
        ClassificationOutcome { result, route }
    }

    /// Apply the channel's sensitivity multiplier (spec §4.6 step 3) and
    /// re-derive severity. A no-op when the channel sensitivity is `1.0`.
    fn apply_sensitivity(&self, raw: NLPResult, channel_id_str: &str) -> NLPResult {
        let channel_id = ash_core::ChannelId::from(channel_id_str);
        let sensitivity = self.policy.sensitivity(&channel_id);
        if (sensitivity - 1.0).abs() < f64::EPSILON {
            return raw;
        }

        let modified = NLPResult::apply_sensitivity(raw.crisis_score, sensitivity);
        let severity = self.thresholds.classify(modified);
        debug!(
            channel = %channel_id,
            original = raw.crisis_score,
            sensitivity,
            modified,
            ?severity,
            "applied channel sensitivity"
        );
        metrics::counter!("sensitivity_adjustments_total", "channel" => channel_id_str.to_string())
            .increment(1);

        NLPResult {
            crisis_score: modified,
            severity,
            original_score: raw.crisis_score,
            sensitivity,
            ..raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitivity_monotonic_never_increases_severity() {
        // property 4: decreasing sensitivity never increases severity.
        let thresholds = SeverityThresholds::default();
        let raw_score = 0.72;
        let high_sens = NLPResult::apply_sensitivity(raw_score, 1.0);
        let low_sens = NLPResult::apply_sensitivity(raw_score, 0.5);
        assert!(thresholds.classify(low_sens) <= thresholds.classify(high_sens));
    }
}
