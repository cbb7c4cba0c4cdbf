use std::sync::Arc;
use std::time::Duration;

use ash_core::types::CheckIn;
use ash_core::{MessageId, UserId};
use ash_kv::{keys, KvStore};
use ash_preferences::PreferencesStore;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::traits::SessionChannel;

const DELIVERED_FIELD: &str = "delivered";
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// TTL slack over the scheduled delay so the record outlives its own
/// deadline comfortably, mirroring the Auto-Initiate Manager's convention.
const TTL_SLACK_SECS: u64 = 3_600;

/// Schedules and delivers the 24h post-session follow-up DM, at-most-once,
/// surviving restarts via the same CAS-to-fire pattern as Auto-Initiate
/// (spec §4.12).
pub struct CheckInScheduler {
    kv: KvStore,
    preferences: PreferencesStore,
    channel: Arc<dyn SessionChannel>,
    delay_secs: i64,
    pending: DashMap<String, CheckIn>,
}

impl CheckInScheduler {
    pub fn new(
        kv: KvStore,
        preferences: PreferencesStore,
        channel: Arc<dyn SessionChannel>,
        delay_hours: u32,
    ) -> Self {
        Self {
            kv,
            preferences,
            channel,
            delay_secs: delay_hours as i64 * 3_600,
            pending: DashMap::new(),
        }
    }

    /// Schedule a follow-up DM for `user_id` 24h (configurable) from `now`.
    pub async fn schedule(
        &self,
        user_id: &UserId,
        source_alert_id: Option<MessageId>,
        now: i64,
    ) {
        let scheduled_for = now + self.delay_secs;
        let check_in = CheckIn {
            user_id: user_id.clone(),
            scheduled_for,
            source_alert_id,
            delivered: false,
        };
        let key = keys::check_in_key(user_id.as_ref(), scheduled_for);
        let ttl = (self.delay_secs as u64).saturating_add(TTL_SLACK_SECS);
        if let Err(e) = self.kv.set_json(&key, &check_in, Some(ttl)).await {
            warn!(error = %e, user = %user_id, "failed to persist check-in, tracking in-memory only");
        }
        self.pending.insert(key, check_in);
    }

    /// One sweep pass: deliver every due, still-pending check-in, re-checking
    /// opt-out at fire time.
    pub async fn sweep(&self, now: i64) {
        let due: Vec<(String, CheckIn)> = self
            .pending
            .iter()
            .filter(|entry| entry.scheduled_for <= now)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (key, check_in) in due {
            if self.preferences.is_opted_out(&check_in.user_id).await {
                // Consume the record so we don't re-evaluate it every sweep,
                // but don't deliver.
                let _ = self.kv.cas_flag_true(&key, DELIVERED_FIELD).await;
                self.pending.remove(&key);
                metrics::counter!("check_ins_total", "outcome" => "cancelled_opted_out")
                    .increment(1);
                continue;
            }

            let won = match self.kv.cas_flag_true(&key, DELIVERED_FIELD).await {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, user = %check_in.user_id, "cas failed during check-in sweep");
                    continue;
                }
            };

            if !won {
                self.pending.remove(&key);
                continue;
            }

            match self.channel.open_dm(&check_in.user_id).await {
                Ok(channel_id) => {
                    if let Err(e) = self.channel.send_check_in(&channel_id).await {
                        warn!(error = %e, user = %check_in.user_id, "failed to deliver check-in dm");
                    } else {
                        info!(user = %check_in.user_id, "delivered 24h follow-up check-in");
                        metrics::counter!("check_ins_total", "outcome" => "delivered").increment(1);
                    }
                }
                Err(e) => {
                    warn!(error = %e, user = %check_in.user_id, "failed to open dm for check-in");
                }
            }

            self.pending.remove(&key);
        }
    }

    /// Startup recovery: rebuild the in-memory map from KV (spec §4.12).
    pub async fn recover(&self) {
        let prefix = keys::check_in_scan_prefix();
        let keys = match self.kv.scan_prefix(&prefix).await {
            Ok(k) => k,
            Err(e) => {
                warn!(error = %e, "failed to scan check-ins on startup");
                return;
            }
        };

        let mut recovered = 0usize;
        for key in keys {
            match self.kv.get_json::<CheckIn>(&key).await {
                Ok(Some(check_in)) if !check_in.delivered => {
                    self.pending.insert(key, check_in);
                    recovered += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, key, "failed to decode check-in during recovery"),
            }
        }
        info!(recovered, "recovered pending check-ins from kv");
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn spawn_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let now = chrono::Utc::now().timestamp();
                self.sweep(now).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_in_key_is_deterministic_from_schedule() {
        let k1 = keys::check_in_key("u1", 1_000);
        let k2 = keys::check_in_key("u1", 1_000);
        assert_eq!(k1, k2);
    }
}
