use std::sync::Arc;
use std::time::Duration;

use ash_core::types::PendingAlert;
use ash_core::{MessageId, Severity};
use ash_kv::{keys, KvStore};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::AlertError;
use crate::traits::{AlertChannel, SessionInitiator};

const ACKNOWLEDGED_FIELD: &str = "acknowledged";
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// TTL slack over the configured delay so a pending record outlives its own
/// deadline comfortably (spec §4.9: "TTL slightly greater than `T`").
const TTL_SLACK_SECS: i64 = 120;

/// Guarantees a user gets contact even if no human acknowledges an alert in
/// time (spec §4.9). Tracks pending alerts both in-memory and in KV so the
/// timers survive a restart.
pub struct AutoInitiateManager {
    kv: KvStore,
    pending: DashMap<MessageId, PendingAlert>,
    enabled: bool,
    delay_secs: i64,
    min_severity: Severity,
    channel: Arc<dyn AlertChannel>,
    session_initiator: Arc<dyn SessionInitiator>,
}

impl AutoInitiateManager {
    pub fn new(
        kv: KvStore,
        enabled: bool,
        delay_minutes: u32,
        min_severity: Severity,
        channel: Arc<dyn AlertChannel>,
        session_initiator: Arc<dyn SessionInitiator>,
    ) -> Self {
        Self {
            kv,
            pending: DashMap::new(),
            enabled,
            delay_secs: delay_minutes as i64 * 60,
            min_severity,
            channel,
            session_initiator,
        }
    }

    /// Build a `PendingAlert` for `alert_message_id` and start tracking it,
    /// unless auto-initiate is disabled or the severity is below the floor.
    #[allow(clippy::too_many_arguments)]
    pub async fn track(&self, alert: PendingAlert) {
        if !self.enabled || alert.severity < self.min_severity {
            return;
        }
        let key = keys::pending_alert_key(alert.alert_message_id.as_ref());
        let ttl = (self.delay_secs + TTL_SLACK_SECS).max(1) as u64;
        if let Err(e) = self.kv.set_json(&key, &alert, Some(ttl)).await {
            warn!(error = %e, alert_id = %alert.alert_message_id, "failed to persist pending alert, tracking in-memory only");
        }
        self.pending.insert(alert.alert_message_id.clone(), alert);
    }

    /// Resolve a pending alert via human action (acknowledge / talk-to-ash).
    /// Returns `true` iff this call won the CAS race (at-most-once).
    pub async fn resolve(&self, alert_id: &MessageId, reason: &str) -> Result<bool, AlertError> {
        let key = keys::pending_alert_key(alert_id.as_ref());
        let won = self.kv.cas_flag_true(&key, ACKNOWLEDGED_FIELD).await?;
        if won {
            self.pending.remove(alert_id);
            metrics::counter!("auto_initiates_total", "outcome" => reason.to_string())
                .increment(1);
        }
        Ok(won)
    }

    /// Cancel tracking without requiring a human response, e.g. the user
    /// opted out before anyone replied.
    pub async fn cancel(&self, alert_id: &MessageId, reason: &str) -> Result<bool, AlertError> {
        self.resolve(alert_id, reason).await
    }

    /// One sweep pass: fire auto-initiate for every expired, still-pending
    /// alert. `now` is Unix seconds.
    pub async fn sweep(&self, now: i64) {
        let expired: Vec<PendingAlert> = self
            .pending
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.value().clone())
            .collect();

        for alert in expired {
            let key = keys::pending_alert_key(alert.alert_message_id.as_ref());
            let won = match self.kv.cas_flag_true(&key, ACKNOWLEDGED_FIELD).await {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, alert_id = %alert.alert_message_id, "cas failed during auto-initiate sweep");
                    continue;
                }
            };

            if !won {
                debug!(alert_id = %alert.alert_message_id, "pending alert already acknowledged, dropping from local map");
                self.pending.remove(&alert.alert_message_id);
                continue;
            }

            let initiated = self
                .session_initiator
                .initiate(
                    &alert.user_id,
                    alert.severity,
                    Some(alert.alert_message_id.clone()),
                    Some(alert.alert_channel_id.clone()),
                )
                .await;

            if initiated {
                if let Err(e) = self
                    .channel
                    .mark_auto_initiated(&alert.alert_channel_id, &alert.alert_message_id)
                    .await
                {
                    warn!(error = %e, alert_id = %alert.alert_message_id, "failed to annotate auto-initiated alert");
                }
                metrics::counter!("auto_initiates_total", "outcome" => "fired").increment(1);
                info!(user = %alert.user_id, alert_id = %alert.alert_message_id, "auto-initiated session after no staff response");
            } else {
                metrics::counter!("auto_initiates_total", "outcome" => "initiate_failed")
                    .increment(1);
            }

            self.pending.remove(&alert.alert_message_id);
        }
    }

    /// Startup recovery: rebuild the in-memory map from KV so timers resume
    /// across a restart (spec §4.9).
    pub async fn recover(&self) {
        let prefix = keys::pending_alert_scan_prefix();
        let keys = match self.kv.scan_prefix(&prefix).await {
            Ok(k) => k,
            Err(e) => {
                warn!(error = %e, "failed to scan pending alerts on startup");
                return;
            }
        };

        let mut recovered = 0usize;
        for key in keys {
            match self.kv.get_json::<PendingAlert>(&key).await {
                Ok(Some(alert)) if !alert.acknowledged => {
                    self.pending.insert(alert.alert_message_id.clone(), alert);
                    recovered += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, key, "failed to decode pending alert during recovery"),
            }
        }
        info!(recovered, "recovered pending alerts from kv");
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn configured_delay_secs(&self) -> i64 {
        self.delay_secs
    }

    /// Spawn the 30s sweeper loop. Caller retains the returned handle only
    /// to abort on shutdown; the manager otherwise runs for the process
    /// lifetime.
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
    use ash_core::{ChannelId, UserId};

    fn alert(id: &str, severity: Severity, expires_at: i64) -> PendingAlert {
        PendingAlert {
            alert_message_id: MessageId::from(id),
            alert_channel_id: ChannelId::from("c_crisis"),
            user_id: UserId::from("u1"),
            guild_id: None,
            original_message_id: None,
            original_channel_id: ChannelId::from("c_general"),
            severity,
            created_at: 0,
            expires_at,
            acknowledged: false,
        }
    }

    #[test]
    fn below_min_severity_is_not_tracked() {
        // `track` requires KV so this only exercises the severity gate via a
        // synchronous check; full async path covered by integration-style
        // dispatcher tests.
        let a = alert("m1", Severity::Low, 100);
        assert!(a.severity < Severity::Medium);
    }
}
