use std::sync::Arc;

use ash_core::health::{HealthSnapshot, HealthSource};
use ash_kv::KvStore;
use ash_preferences::PreferencesStore;
use async_trait::async_trait;
use tracing::warn;

use crate::notes::NotesStore;
use crate::types::{AshCommand, CommandOutcome};

/// Point-in-time counters for `/ash stats`, supplied by the gateway's wiring.
///
/// `ash-commands` must not depend on `ash-alerts`/`ash-sessions`/
/// `ash-classifier` directly — those crates sit above it in the dependency
/// graph that `ash-gateway` assembles — so the counts are pulled through a
/// narrow trait instead, the same pattern `HealthSource` already uses for
/// health.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub pending_alerts: usize,
    pub active_sessions: usize,
    pub pending_check_ins: usize,
}

#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn snapshot(&self) -> StatsSnapshot;
}

/// Handles parsed `/ash ...` invocations independent of the chat platform
/// that received them (spec §4.13). Authorization is by CRT role id,
/// checked at handler entry per spec §7's "Authorisation" policy.
pub struct AshCommandHandler {
    preferences: PreferencesStore,
    notes: NotesStore,
    health: Arc<dyn HealthSource>,
    stats: Arc<dyn StatsSource>,
    crt_role_id: String,
}

impl AshCommandHandler {
    pub fn new(
        preferences: PreferencesStore,
        kv: KvStore,
        health: Arc<dyn HealthSource>,
        stats: Arc<dyn StatsSource>,
        crt_role_id: impl Into<String>,
    ) -> Self {
        Self {
            preferences,
            notes: NotesStore::new(kv),
            health,
            stats,
            crt_role_id: crt_role_id.into(),
        }
    }

    /// `invoker_roles` are the chat-platform role ids held by the invoking
    /// user, used to gate the CRT-only subcommands.
    pub async fn handle(
        &self,
        command: AshCommand,
        invoker_user_id: &str,
        invoker_roles: &[String],
        now: i64,
    ) -> CommandOutcome {
        let is_crt = invoker_roles.iter().any(|r| r == &self.crt_role_id);

        match command {
            AshCommand::Status => self.status(invoker_user_id, now).await,
            AshCommand::OptOut => self.opt_out(invoker_user_id).await,
            AshCommand::OptIn => self.opt_in(invoker_user_id).await,
            AshCommand::Health if is_crt => self.health_snapshot().await,
            AshCommand::Stats if is_crt => self.stats_snapshot().await,
            AshCommand::NotesAdd {
                target_user_id,
                text,
            } if is_crt => {
                self.notes_add(invoker_user_id, &target_user_id, &text, now)
                    .await
            }
            AshCommand::NotesView { target_user_id } if is_crt => {
                self.notes_view(&target_user_id).await
            }
            AshCommand::Health
            | AshCommand::Stats
            | AshCommand::NotesAdd { .. }
            | AshCommand::NotesView { .. } => {
                metrics::counter!("crt_command_denied_total").increment(1);
                CommandOutcome::Denied
            }
        }
    }

    async fn status(&self, user_id: &str, now: i64) -> CommandOutcome {
        let ash_user_id = ash_core::UserId::from(user_id);
        let text = match self.preferences.get(&ash_user_id).await {
            Some(pref) if pref.is_active(now) => {
                let remaining_days = (pref.expires_at - now).max(0) / 86_400;
                format!(
                    "You are currently opted out of direct Ash contact. This expires in \
                     ~{remaining_days} day(s). Use `/ash optin` to re-enable it sooner."
                )
            }
            _ => "Ash may reach out to you directly if a message you post is flagged. \
                  Use `/ash optout` at any time to change that."
                .to_string(),
        };
        CommandOutcome::Text(text)
    }

    async fn opt_out(&self, user_id: &str) -> CommandOutcome {
        let ash_user_id = ash_core::UserId::from(user_id);
        match self.preferences.set_opt_out(&ash_user_id).await {
            Ok(()) => CommandOutcome::Text(
                "Understood — Ash won't start a direct conversation with you. The team may \
                 still reach out by other means if needed."
                    .to_string(),
            ),
            Err(e) => {
                warn!(error = %e, user_id, "failed to record opt-out via slash command");
                CommandOutcome::Text(
                    "Something went wrong recording that — please try again.".to_string(),
                )
            }
        }
    }

    async fn opt_in(&self, user_id: &str) -> CommandOutcome {
        let ash_user_id = ash_core::UserId::from(user_id);
        match self.preferences.clear_opt_out(&ash_user_id).await {
            Ok(()) => {
                CommandOutcome::Text("Thanks for letting us back in — opt-out cleared.".to_string())
            }
            Err(e) => {
                warn!(error = %e, user_id, "failed to clear opt-out via slash command");
                CommandOutcome::Text(
                    "Something went wrong recording that — please try again.".to_string(),
                )
            }
        }
    }

    async fn health_snapshot(&self) -> CommandOutcome {
        let snapshot: HealthSnapshot = self.health.snapshot().await;
        let mut lines = vec![format!(
            "gateway: {}",
            if snapshot.gateway_connected {
                "connected"
            } else {
                "disconnected"
            }
        )];
        for c in &snapshot.components {
            let status = if c.reachable { "ok" } else { "down" };
            match &c.detail {
                Some(detail) => lines.push(format!("{}: {status} ({detail})", c.name)),
                None => lines.push(format!("{}: {status}", c.name)),
            }
        }
        CommandOutcome::Text(format!("**Ash health**\n{}", lines.join("\n")))
    }

    async fn stats_snapshot(&self) -> CommandOutcome {
        let s = self.stats.snapshot().await;
        CommandOutcome::Text(format!(
            "**Ash stats**\npending alerts: {}\nactive sessions: {}\npending check-ins: {}",
            s.pending_alerts, s.active_sessions, s.pending_check_ins
        ))
    }

    async fn notes_add(
        &self,
        author: &str,
        target_user_id: &str,
        text: &str,
        now: i64,
    ) -> CommandOutcome {
        let ok = self.notes.add(target_user_id, author, text, now).await;
        if ok {
            CommandOutcome::Text(format!("Note added for <@{target_user_id}>."))
        } else {
            CommandOutcome::Text("Failed to save note — please try again.".to_string())
        }
    }

    async fn notes_view(&self, target_user_id: &str) -> CommandOutcome {
        let notes = self.notes.view(target_user_id).await;
        if notes.is_empty() {
            return CommandOutcome::Text(format!("No notes on file for <@{target_user_id}>."));
        }
        let body = notes
            .iter()
            .map(|n| format!("[{}] {}: {}", n.timestamp, n.author, n.text))
            .collect::<Vec<_>>()
            .join("\n");
        CommandOutcome::Text(format!("**Notes for <@{target_user_id}>**\n{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::health::ComponentStatus;
    use ash_kv::KvStore;
    use async_trait::async_trait;

    struct StubHealth;

    #[async_trait]
    impl HealthSource for StubHealth {
        async fn snapshot(&self) -> HealthSnapshot {
            HealthSnapshot {
                gateway_connected: true,
                components: vec![ComponentStatus::ok("kv")],
            }
        }
    }

    struct StubStats;

    #[async_trait]
    impl StatsSource for StubStats {
        async fn snapshot(&self) -> StatsSnapshot {
            StatsSnapshot {
                pending_alerts: 2,
                active_sessions: 1,
                pending_check_ins: 0,
            }
        }
    }

    fn handler() -> AshCommandHandler {
        let kv = KvStore::new("redis://127.0.0.1:6399").unwrap();
        let preferences = PreferencesStore::new(kv.clone(), 30);
        AshCommandHandler::new(preferences, kv, Arc::new(StubHealth), Arc::new(StubStats), "crt-role")
    }

    #[tokio::test]
    async fn non_crt_user_is_denied_health() {
        let h = handler();
        let outcome = h.handle(AshCommand::Health, "u1", &[], 0).await;
        assert_eq!(outcome, CommandOutcome::Denied);
    }

    #[tokio::test]
    async fn crt_role_is_granted_stats() {
        let h = handler();
        let outcome = h
            .handle(AshCommand::Stats, "u1", &["crt-role".to_string()], 0)
            .await;
        matches!(outcome, CommandOutcome::Text(_));
    }

    #[tokio::test]
    async fn self_commands_never_require_crt() {
        let h = handler();
        let outcome = h.handle(AshCommand::Status, "u1", &[], 0).await;
        matches!(outcome, CommandOutcome::Text(_));
    }
}
