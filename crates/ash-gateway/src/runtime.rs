//! Constructs every component from config and wires them together. This is
//! the only place in the workspace allowed to depend on every other `ash-*`
//! crate (spec §9 "Global mutable state: none required; components are
//! constructed once and wired in the runtime").

use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use ash_alerts::{AlertChannel, AlertDispatcher, AutoInitiateManager, ControlAction};
use ash_classifier::ClassifierPipeline;
use ash_commands::AshCommandHandler;
use ash_cooldown::{CooldownGuard, CooldownWindows};
use ash_core::config::AshConfig;
use ash_core::health::HealthSource;
use ash_core::{ChannelId, Result as AshResult, Severity};
use ash_discord::{
    AlertDispatcherAnnotator, DiscordAdapter, DiscordAlertChannel, DiscordSessionChannel, Inner,
    SessionManagerInitiator, WelcomeMap,
};
use ash_history::HistoryStore;
use ash_kv::KvStore;
use ash_llm::LlmClient;
use ash_nlp::NlpClient;
use ash_policy::ChannelPolicy;
use ash_preferences::PreferencesStore;
use ash_sessions::{CheckInScheduler, SessionChannel, SessionManager};
use serenity::model::id::{RoleId, UserId as SerenityUserId};
use tokio::signal;
use tracing::{info, warn};

use crate::health::GatewayHealth;
use crate::stats::GatewayStats;

/// Parse a config severity string, falling back to `default` with a warning
/// rather than refusing to start over a typo in a non-fatal field.
fn parse_severity(label: &str, field: &'static str, default: Severity) -> Severity {
    Severity::from_str(label).unwrap_or_else(|_| {
        warn!(field, value = label, "invalid severity in config, using default");
        default
    })
}

/// Wire every component and drive the process until shutdown. Returns once
/// a shutdown signal has been handled and every background task stopped.
pub async fn run(config: AshConfig) -> AshResult<()> {
    let discord_token = config.secrets.discord_token()?;
    let claude_api_key = config.secrets.claude_api_key()?;
    let redis_token = config.secrets.redis_token();

    let kv = KvStore::with_deadline(
        &config.redis.url(redis_token.as_deref()),
        config.redis.deadline_secs,
    )
    .map_err(|e| ash_core::AshError::Fatal(format!("invalid redis url: {e}")))?;

    let history = HistoryStore::new(
        kv.clone(),
        config.history.ttl_days,
        config.history.max_messages,
        parse_severity(&config.history.min_severity, "history.min_severity", Severity::Low),
    );
    let preferences = PreferencesStore::new(kv.clone(), config.opt_out.ttl_days);

    let monitored_channels = config
        .channels
        .monitored_channels
        .iter()
        .map(|s| ChannelId::from(s.as_str()));
    let policy = Arc::new(ChannelPolicy::new(
        monitored_channels,
        config.channels.default_channel_sensitivity,
        ChannelId::from(config.channels.alert_channel_crisis.as_str()),
        ChannelId::from(config.channels.alert_channel_monitor.as_str()),
    ));

    let nlp = NlpClient::new(
        config.nlp.base_url.clone(),
        config.nlp.timeout_secs,
        config.nlp.retry_attempts,
        config.nlp.circuit_breaker_failure_threshold,
        config.nlp.circuit_breaker_cooldown_secs,
    );
    let classifier = Arc::new(ClassifierPipeline::new(
        history,
        nlp,
        policy.clone(),
        config.thresholds,
    ));

    let cooldown = CooldownGuard::new(CooldownWindows {
        medium_secs: config.cooldown.medium_secs,
        high_secs: config.cooldown.high_secs,
        critical_secs: config.cooldown.critical_secs,
    });

    let http = Arc::new(serenity::http::Http::new(&discord_token));

    let crt_role_id = config
        .channels
        .crt_role_id
        .parse::<u64>()
        .map(RoleId::new)
        .map_err(|_| ash_core::AshError::Config("channels.crt_role_id is not a valid id".into()))?;
    let crt_lead_user_id = config
        .channels
        .crt_lead_user_id
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .map(SerenityUserId::new);

    let alert_channel: Arc<dyn AlertChannel> = Arc::new(DiscordAlertChannel::new(
        http.clone(),
        crt_role_id,
        crt_lead_user_id,
    ));
    let controls = ControlAction::parse_config_list(&config.alerts.controls);
    let dispatcher = Arc::new(AlertDispatcher::new(cooldown, alert_channel.clone(), controls));

    let session_channel: Arc<dyn SessionChannel> = Arc::new(DiscordSessionChannel::new(http.clone()));
    let alert_annotator = Arc::new(AlertDispatcherAnnotator {
        dispatcher: dispatcher.clone(),
    });
    let check_in = Arc::new(CheckInScheduler::new(
        kv.clone(),
        preferences.clone(),
        session_channel.clone(),
        config.session.check_in_delay_hours,
    ));

    let llm = LlmClient::new(
        config.llm.base_url.clone(),
        claude_api_key,
        config.llm.model.clone(),
        config.llm.timeout_secs,
        config.llm.retry_attempts,
        config.llm.circuit_breaker_failure_threshold,
        config.llm.circuit_breaker_cooldown_secs,
    );

    let check_in_min_severity = parse_severity(
        &config.session.check_in_min_severity,
        "session.check_in_min_severity",
        Severity::High,
    );
    let sessions = Arc::new(SessionManager::new(
        preferences.clone(),
        llm,
        session_channel.clone(),
        alert_annotator,
        check_in.clone(),
        config.session.idle_timeout_minutes,
        config.session.context_window_turns,
        check_in_min_severity,
    ));

    let welcome_map = Arc::new(WelcomeMap::new());
    let session_initiator = Arc::new(SessionManagerInitiator {
        sessions: sessions.clone(),
        welcome_map: welcome_map.clone(),
    });

    let auto_initiate_min_severity = parse_severity(
        &config.auto_initiate.min_severity,
        "auto_initiate.min_severity",
        Severity::Medium,
    );
    let auto_initiate = Arc::new(AutoInitiateManager::new(
        kv.clone(),
        config.auto_initiate.enabled,
        config.auto_initiate.clamped_delay_minutes(),
        auto_initiate_min_severity,
        alert_channel.clone(),
        session_initiator,
    ));
    dispatcher.set_auto_initiate(auto_initiate.clone());

    info!("recovering durable state from kv");
    auto_initiate.recover().await;
    check_in.recover().await;

    let gateway_connected = Arc::new(AtomicBool::new(false));
    let health: Arc<dyn HealthSource> = Arc::new(GatewayHealth::new(
        kv.clone(),
        config.nlp.base_url.clone(),
        gateway_connected.clone(),
    ));
    let stats = Arc::new(GatewayStats {
        auto_initiate: auto_initiate.clone(),
        sessions: sessions.clone(),
        check_in: check_in.clone(),
    });

    let commands = Arc::new(AshCommandHandler::new(
        preferences.clone(),
        kv.clone(),
        health.clone(),
        stats,
        config.channels.crt_role_id.clone(),
    ));

    let inner = Arc::new(Inner::new(
        policy,
        classifier,
        dispatcher,
        sessions.clone(),
        preferences,
        commands,
        welcome_map,
        crt_role_id,
        config.queue.per_user_size,
        gateway_connected.clone(),
    ));

    let prometheus = ash_metrics::install_recorder();
    let metrics_state = Arc::new(ash_metrics::MetricsState {
        health: health.clone(),
        prometheus,
    });
    let metrics_addr = format!("0.0.0.0:{}", config.health.port)
        .parse()
        .map_err(|e| ash_core::AshError::Config(format!("invalid health port: {e}")))?;
    let metrics_task = tokio::spawn(async move {
        if let Err(e) = ash_metrics::server::spawn(metrics_addr, metrics_state).await {
            tracing::error!(error = %e, "health & metrics server exited");
        }
    });

    let auto_initiate_sweeper = auto_initiate.clone().spawn_sweeper();
    let check_in_sweeper = check_in.clone().spawn_sweeper();
    let idle_sweeper = tokio::spawn(session_idle_sweep(sessions));

    let adapter = DiscordAdapter::new(discord_token, inner);
    let gateway_task = tokio::spawn(adapter.run());

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping background tasks");

    metrics_task.abort();
    auto_initiate_sweeper.abort();
    check_in_sweeper.abort();
    idle_sweeper.abort();
    gateway_task.abort();

    Ok(())
}

const SESSION_IDLE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Sweeps idle sessions once a minute; `SessionManager` has no built-in
/// spawner of its own since, unlike the KV-backed pending/check-in sweepers,
/// it needs no recovery step.
async fn session_idle_sweep(sessions: Arc<SessionManager>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(
        SESSION_IDLE_SWEEP_INTERVAL_SECS,
    ));
    loop {
        interval.tick().await;
        let now = chrono::Utc::now().timestamp();
        sessions.sweep_idle(now).await;
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
