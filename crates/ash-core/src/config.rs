use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AshError, Result};
use crate::severity::SeverityThresholds;

pub const DEFAULT_HEALTH_PORT: u16 = 30881;
pub const DEFAULT_QUEUE_SIZE: usize = 16;

/// Top-level config (`ash.toml` + `ASH_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AshConfig {
    #[serde(default)]
    pub secrets: SecretsConfig,
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub thresholds: SeverityThresholds,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub auto_initiate: AutoInitiateConfig,
    #[serde(default)]
    pub opt_out: OptOutConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub nlp: NlpConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Paths to secret files. Secrets are never stored inline in config — only
/// the path to a file containing them, following the teacher's
/// `token_path`/`credentials_path` convention for provider credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    pub discord_token_path: Option<String>,
    pub claude_api_key_path: Option<String>,
    pub redis_token_path: Option<String>,
}

impl SecretsConfig {
    pub fn discord_token(&self) -> Result<String> {
        load_secret_file(
            self.discord_token_path.as_deref(),
            "BOT_DISCORD_TOKEN secret file",
        )
    }

    pub fn claude_api_key(&self) -> Result<String> {
        load_secret_file(
            self.claude_api_key_path.as_deref(),
            "CLAUDE_API_KEY secret file",
        )
    }

    pub fn redis_token(&self) -> Option<String> {
        self.redis_token_path
            .as_deref()
            .and_then(|p| load_secret_file(Some(p), "REDIS_TOKEN secret file").ok())
    }
}

fn load_secret_file(path: Option<&str>, label: &str) -> Result<String> {
    let path = path.ok_or_else(|| AshError::Fatal(format!("missing {label} path")))?;
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AshError::Fatal(format!("failed to read {label} at {path}: {e}")))?;
    let trimmed = contents.trim().to_string();
    if trimmed.is_empty() {
        return Err(AshError::Fatal(format!("{label} at {path} is empty")));
    }
    Ok(trimmed)
}

/// Monitored channels, alert routing, CRT role, and default sensitivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub monitored_channels: Vec<String>,
    pub alert_channel_crisis: String,
    pub alert_channel_monitor: String,
    pub crt_role_id: String,
    /// Fallback DM target when posting the alert embed itself fails after
    /// retries (spec §4.8 "fall back to DMing the CRT lead").
    #[serde(default)]
    pub crt_lead_user_id: Option<String>,
    #[serde(default = "default_sensitivity")]
    pub default_channel_sensitivity: f64,
}

fn default_sensitivity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    #[serde(default = "default_cooldown_medium")]
    pub medium_secs: u64,
    #[serde(default = "default_cooldown_high")]
    pub high_secs: u64,
    #[serde(default = "default_cooldown_critical")]
    pub critical_secs: u64,
}

fn default_cooldown_medium() -> u64 {
    15 * 60
}
fn default_cooldown_high() -> u64 {
    10 * 60
}
fn default_cooldown_critical() -> u64 {
    5 * 60
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            medium_secs: default_cooldown_medium(),
            high_secs: default_cooldown_high(),
            critical_secs: default_cooldown_critical(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoInitiateConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_auto_initiate_delay")]
    pub delay_minutes: u32,
    #[serde(default = "default_auto_initiate_min_severity")]
    pub min_severity: String,
}

fn default_auto_initiate_delay() -> u32 {
    3
}
fn default_auto_initiate_min_severity() -> String {
    "medium".to_string()
}

impl Default for AutoInitiateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_minutes: default_auto_initiate_delay(),
            min_severity: default_auto_initiate_min_severity(),
        }
    }
}

impl AutoInitiateConfig {
    /// Clamp `delay_minutes` into the documented 1-60 range, warning if it
    /// was out of range.
    pub fn clamped_delay_minutes(&self) -> u32 {
        let clamped = self.delay_minutes.clamp(1, 60);
        if clamped != self.delay_minutes {
            tracing::warn!(
                configured = self.delay_minutes,
                clamped,
                "auto_initiate.delay_minutes out of range [1,60], clamped"
            );
        }
        clamped
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptOutConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_optout_ttl_days")]
    pub ttl_days: u32,
}

fn default_optout_ttl_days() -> u32 {
    30
}

impl Default for OptOutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_days: default_optout_ttl_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_ttl_days")]
    pub ttl_days: u32,
    #[serde(default = "default_history_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_history_min_severity")]
    pub min_severity: String,
}

fn default_history_ttl_days() -> u32 {
    90
}
fn default_history_max_messages() -> usize {
    50
}
fn default_history_min_severity() -> String {
    "low".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_history_ttl_days(),
            max_messages: default_history_max_messages(),
            min_severity: default_history_min_severity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpConfig {
    #[serde(default = "default_nlp_base_url")]
    pub base_url: String,
    #[serde(default = "default_nlp_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_cb_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_cb_cooldown_secs")]
    pub circuit_breaker_cooldown_secs: u64,
}

fn default_nlp_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_nlp_timeout_secs() -> u64 {
    30
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_cb_failure_threshold() -> u32 {
    5
}
fn default_cb_cooldown_secs() -> u64 {
    60
}

impl Default for NlpConfig {
    fn default() -> Self {
        Self {
            base_url: default_nlp_base_url(),
            timeout_secs: default_nlp_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            circuit_breaker_failure_threshold: default_cb_failure_threshold(),
            circuit_breaker_cooldown_secs: default_cb_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_cb_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_cb_cooldown_secs")]
    pub circuit_breaker_cooldown_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_llm_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            circuit_breaker_failure_threshold: default_cb_failure_threshold(),
            circuit_breaker_cooldown_secs: default_cb_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub db: u32,
    #[serde(default = "default_kv_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}
fn default_redis_port() -> u16 {
    6379
}
fn default_kv_deadline_secs() -> u64 {
    5
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            deadline_secs: default_kv_deadline_secs(),
        }
    }
}

impl RedisConfig {
    /// Build a `redis://` URL, embedding an auth token if supplied.
    pub fn url(&self, token: Option<&str>) -> String {
        match token {
            Some(t) => format!("redis://:{}@{}:{}/{}", t, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_port")]
    pub port: u16,
}

fn default_health_port() -> u16 {
    DEFAULT_HEALTH_PORT
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: default_health_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Which interactive controls the Alert Dispatcher attaches to an alert
/// embed. Config-driven per the spec's Open Questions resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_controls")]
    pub controls: Vec<String>,
}

fn default_controls() -> Vec<String> {
    vec![
        "acknowledge".to_string(),
        "talk_to_ash".to_string(),
        "history".to_string(),
    ]
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            controls: default_controls(),
        }
    }
}

/// Session Manager and Check-In Scheduler timing (spec §4.11, §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u32,
    #[serde(default = "default_context_window_turns")]
    pub context_window_turns: usize,
    #[serde(default = "default_check_in_delay_hours")]
    pub check_in_delay_hours: u32,
    #[serde(default = "default_check_in_min_severity")]
    pub check_in_min_severity: String,
}

fn default_idle_timeout_minutes() -> u32 {
    10
}
fn default_context_window_turns() -> usize {
    10
}
fn default_check_in_delay_hours() -> u32 {
    24
}
fn default_check_in_min_severity() -> String {
    "high".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout_minutes(),
            context_window_turns: default_context_window_turns(),
            check_in_delay_hours: default_check_in_delay_hours(),
            check_in_min_severity: default_check_in_min_severity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_size")]
    pub per_user_size: usize,
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            per_user_size: default_queue_size(),
        }
    }
}

fn bool_true() -> bool {
    true
}

impl AshConfig {
    /// Load config from a TOML file with `ASH_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, `ASH_CONFIG` env var,
    /// `~/.ash/ash.toml`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("ASH_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: AshConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ASH_").split("_"))
            .extract()
            .map_err(|e| AshError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.ash/ash.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_initiate_delay_clamps_out_of_range() {
        let mut cfg = AutoInitiateConfig::default();
        cfg.delay_minutes = 120;
        assert_eq!(cfg.clamped_delay_minutes(), 60);
        cfg.delay_minutes = 0;
        assert_eq!(cfg.clamped_delay_minutes(), 1);
        cfg.delay_minutes = 5;
        assert_eq!(cfg.clamped_delay_minutes(), 5);
    }

    #[test]
    fn redis_url_embeds_token() {
        let cfg = RedisConfig::default();
        assert_eq!(cfg.url(None), "redis://127.0.0.1:6379/0");
        assert_eq!(cfg.url(Some("tok")), "redis://:tok@127.0.0.1:6379/0");
    }
}
