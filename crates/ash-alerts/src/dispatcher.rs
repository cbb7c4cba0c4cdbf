use std::sync::{Arc, OnceLock};

use ash_core::types::PendingAlert;
use ash_core::{ChannelId, MessageId};
use ash_cooldown::CooldownGuard;
use tracing::{error, warn};

use crate::auto_initiate::AutoInitiateManager;
use crate::traits::AlertChannel;
use crate::types::{AlertContext, AlertEmbedSpec, ControlAction, DispatchOutcome};

/// Evaluates cooldown, posts the alert embed, and hands the result off to
/// the Auto-Initiate Manager (spec §4.8).
///
/// The manager reference is injected post-construction via
/// [`Self::set_auto_initiate`] rather than taken in `new`, because the
/// manager's sweeper in turn needs a `SessionInitiator` that is only wired
/// up once the rest of the gateway exists — taking it in the constructor
/// would force a cycle at wiring time.
pub struct AlertDispatcher {
    cooldown: CooldownGuard,
    channel: Arc<dyn AlertChannel>,
    controls: Vec<ControlAction>,
    auto_initiate: OnceLock<Arc<AutoInitiateManager>>,
}

impl AlertDispatcher {
    pub fn new(
        cooldown: CooldownGuard,
        channel: Arc<dyn AlertChannel>,
        controls: Vec<ControlAction>,
    ) -> Self {
        Self {
            cooldown,
            channel,
            controls,
            auto_initiate: OnceLock::new(),
        }
    }

    pub fn set_auto_initiate(&self, manager: Arc<AutoInitiateManager>) {
        if self.auto_initiate.set(manager).is_err() {
            warn!("auto-initiate manager set more than once on alert dispatcher, ignoring");
        }
    }

    pub async fn dispatch(&self, ctx: AlertContext, now: i64) -> DispatchOutcome {
        if self
            .cooldown
            .should_suppress(&ctx.user_id, ctx.nlp.severity, now)
        {
            metrics::counter!("alerts_suppressed_total", "reason" => "cooldown").increment(1);
            return DispatchOutcome::Suppressed;
        }

        let spec = AlertEmbedSpec {
            user_id: ctx.user_id.clone(),
            severity: ctx.nlp.severity,
            truncated_text: ctx.text.clone(),
            crisis_score: ctx.nlp.crisis_score,
            categories: ctx.nlp.categories.clone(),
            confidence: ctx.nlp.confidence,
            opted_out: ctx.opted_out,
            original_message_id: ctx.original_message_id.clone(),
            original_channel_id: ctx.original_channel_id.clone(),
        };

        let posted = self
            .channel
            .post_alert(&ctx.target_channel, &spec, &self.controls, ctx.ping_crt)
            .await;

        let alert_message_id = match posted {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, user = %ctx.user_id, "failed to post alert, falling back to dm");
                return match self.channel.dm_crt_lead(&spec).await {
                    Ok(()) => DispatchOutcome::FellBackToDm,
                    Err(e2) => {
                        error!(error = %e2, user = %ctx.user_id, "dm fallback also failed, dropping alert");
                        DispatchOutcome::Dropped
                    }
                };
            }
        };

        self.cooldown
            .record_alert(&ctx.user_id, ctx.nlp.severity, now);

        if let Some(manager) = self.auto_initiate.get() {
            let pending = PendingAlert {
                alert_message_id: alert_message_id.clone(),
                alert_channel_id: ctx.target_channel.clone(),
                user_id: ctx.user_id.clone(),
                guild_id: ctx.guild_id.clone(),
                original_message_id: ctx.original_message_id.clone(),
                original_channel_id: ctx.original_channel_id.clone(),
                severity: ctx.nlp.severity,
                created_at: now,
                expires_at: now + manager_delay_secs(manager),
                acknowledged: false,
            };
            manager.track(pending).await;
        }

        metrics::counter!(
            "alerts_sent_total",
            "severity" => ctx.nlp.severity.as_str(),
            "channel" => ctx.target_channel.to_string()
        )
        .increment(1);

        DispatchOutcome::Sent { alert_message_id }
    }

    /// Handle an Acknowledge button click: cancels auto-initiate and returns
    /// `true` iff this click won the at-most-once race.
    pub async fn acknowledge(&self, alert_id: &MessageId) -> bool {
        self.resolve(alert_id, "acknowledged").await
    }

    /// Handle a Talk-to-Ash button click: same resolution as acknowledge,
    /// since a staff member engaging directly also counts as a response.
    pub async fn talk_to_ash_clicked(&self, alert_id: &MessageId) -> bool {
        self.resolve(alert_id, "talk_to_ash").await
    }

    async fn resolve(&self, alert_id: &MessageId, reason: &str) -> bool {
        match self.auto_initiate.get() {
            Some(manager) => manager.resolve(alert_id, reason).await.unwrap_or(false),
            None => false,
        }
    }

    /// Annotate an alert embed to show the user opted out before staff
    /// responded, and cancel any pending auto-initiate for it (spec §4.11
    /// opt-out-via-reaction). Called through [`crate::traits::AlertChannel`]'s
    /// caller-side bridge, never directly by `ash-sessions`.
    pub async fn annotate_opted_out(&self, alert_channel_id: &ChannelId, alert_message_id: &MessageId) {
        if let Some(manager) = self.auto_initiate.get() {
            let _ = manager.cancel(alert_message_id, "user_opted_out").await;
        }
        if let Err(e) = self
            .channel
            .mark_user_opted_out(alert_channel_id, alert_message_id)
            .await
        {
            error!(error = %e, alert_id = %alert_message_id, "failed to annotate opted-out alert");
        }
    }
}

/// Read-only accessor the dispatcher needs to compute a pending alert's
/// deadline; `AutoInitiateManager` doesn't expose its delay directly since
/// nothing else needs it, so this threads it through narrowly.
fn manager_delay_secs(manager: &AutoInitiateManager) -> i64 {
    manager.configured_delay_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::types::NLPResult;
    use ash_core::{ChannelId, GuildId, Severity, SeverityThresholds, UserId};
    use ash_cooldown::CooldownWindows;

    struct StubChannel {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl AlertChannel for StubChannel {
        async fn post_alert(
            &self,
            _channel_id: &ChannelId,
            _spec: &AlertEmbedSpec,
            _controls: &[ControlAction],
            _ping_crt: bool,
        ) -> Result<MessageId, crate::error::AlertError> {
            if self.fail {
                Err(crate::error::AlertError::ChannelUnavailable)
            } else {
                Ok(MessageId::from("alert-1"))
            }
        }

        async fn dm_crt_lead(&self, _spec: &AlertEmbedSpec) -> Result<(), crate::error::AlertError> {
            Ok(())
        }

        async fn mark_auto_initiated(
            &self,
            _channel_id: &ChannelId,
            _alert_message_id: &MessageId,
        ) -> Result<(), crate::error::AlertError> {
            Ok(())
        }

        async fn mark_user_opted_out(
            &self,
            _channel_id: &ChannelId,
            _alert_message_id: &MessageId,
        ) -> Result<(), crate::error::AlertError> {
            Ok(())
        }
    }

    fn ctx(severity: Severity) -> AlertContext {
        let thresholds = SeverityThresholds::default();
        AlertContext {
            user_id: UserId::from("u1"),
            guild_id: Some(GuildId::from("g1")),
            original_message_id: None,
            original_channel_id: ChannelId::from("c_general"),
            target_channel: ChannelId::from("c_crisis"),
            ping_crt: true,
            text: "help".to_string(),
            nlp: NLPResult {
                crisis_score: thresholds.high,
                severity,
                categories: vec!["self_harm".to_string()],
                confidence: 0.9,
                model_agreement: "agree".to_string(),
                gaps_detected: false,
                reasoning: None,
                original_score: thresholds.high,
                sensitivity: 1.0,
            },
            opted_out: false,
        }
    }

    fn dispatcher(fail: bool) -> AlertDispatcher {
        let windows = CooldownWindows {
            medium_secs: 900,
            high_secs: 600,
            critical_secs: 300,
        };
        AlertDispatcher::new(
            CooldownGuard::new(windows),
            Arc::new(StubChannel { fail }),
            ControlAction::parse_config_list(&[
                "acknowledge".to_string(),
                "talk_to_ash".to_string(),
            ]),
        )
    }

    #[tokio::test]
    async fn successful_dispatch_records_cooldown_and_returns_sent() {
        let d = dispatcher(false);
        let outcome = d.dispatch(ctx(Severity::High), 1_000).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                alert_message_id: MessageId::from("alert-1")
            }
        );
    }

    #[tokio::test]
    async fn second_alert_within_cooldown_window_is_suppressed() {
        let d = dispatcher(false);
        let _ = d.dispatch(ctx(Severity::High), 1_000).await;
        let outcome = d.dispatch(ctx(Severity::High), 1_060).await;
        assert_eq!(outcome, DispatchOutcome::Suppressed);
    }

    #[tokio::test]
    async fn post_failure_falls_back_to_dm() {
        let d = dispatcher(true);
        let outcome = d.dispatch(ctx(Severity::Critical), 1_000).await;
        assert_eq!(outcome, DispatchOutcome::FellBackToDm);
    }

    #[tokio::test]
    async fn acknowledge_without_auto_initiate_wired_is_a_noop() {
        let d = dispatcher(false);
        assert!(!d.acknowledge(&MessageId::from("alert-1")).await);
    }
}
