use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use ash_core::{ChannelId, Severity};
use tracing::warn;

use crate::types::RouteDecision;

/// Valid range for a channel's sensitivity modifier (spec §4.1).
pub const SENSITIVITY_MIN: f64 = 0.3;
pub const SENSITIVITY_MAX: f64 = 2.0;
const DEFAULT_SENSITIVITY: f64 = 1.0;

#[derive(Debug, Clone)]
struct ChannelPolicyState {
    monitored: HashSet<ChannelId>,
    sensitivity: HashMap<ChannelId, f64>,
    default_sensitivity: f64,
    crisis_channel: ChannelId,
    monitor_channel: ChannelId,
}

/// Monitored-channel set, per-channel sensitivity, and alert-channel routing.
///
/// Reads (`is_monitored`, `sensitivity`, `route`) are the hot path — every
/// monitored message touches them — so they take a read lock only; runtime
/// overrides (slash-command-driven sensitivity changes) are rare admin
/// actions and take the write lock, the same infrequent-write/hot-read split
/// used for the teacher's few mutable-but-rarely-written structures.
pub struct ChannelPolicy {
    state: RwLock<ChannelPolicyState>,
}

impl ChannelPolicy {
    pub fn new(
        monitored_channels: impl IntoIterator<Item = ChannelId>,
        default_sensitivity: f64,
        crisis_channel: ChannelId,
        monitor_channel: ChannelId,
    ) -> Self {
        let clamped_default = clamp_sensitivity(default_sensitivity);
        Self {
            state: RwLock::new(ChannelPolicyState {
                monitored: monitored_channels.into_iter().collect(),
                sensitivity: HashMap::new(),
                default_sensitivity: clamped_default,
                crisis_channel,
                monitor_channel,
            }),
        }
    }

    pub fn is_monitored(&self, channel_id: &ChannelId) -> bool {
        self.state.read().unwrap().monitored.contains(channel_id)
    }

    /// Effective sensitivity modifier for `channel_id`: an explicit override
    /// if one was set, else the configured default.
    pub fn sensitivity(&self, channel_id: &ChannelId) -> f64 {
        let state = self.state.read().unwrap();
        state
            .sensitivity
            .get(channel_id)
            .copied()
            .unwrap_or(state.default_sensitivity)
    }

    /// Set a per-channel sensitivity override, clamping out-of-range values
    /// into `[SENSITIVITY_MIN, SENSITIVITY_MAX]` with a warning.
    pub fn set_sensitivity(&self, channel_id: ChannelId, value: f64) {
        let clamped = clamp_sensitivity(value);
        if (clamped - value).abs() > f64::EPSILON {
            warn!(
                channel = %channel_id,
                requested = value,
                clamped,
                "channel sensitivity out of range, clamped"
            );
        }
        self.state
            .write()
            .unwrap()
            .sensitivity
            .insert(channel_id, clamped);
    }

    pub fn add_monitored(&self, channel_id: ChannelId) {
        self.state.write().unwrap().monitored.insert(channel_id);
    }

    pub fn remove_monitored(&self, channel_id: &ChannelId) {
        self.state.write().unwrap().monitored.remove(channel_id);
    }

    /// Total function of severity to routing decision (spec invariant,
    /// testable property 7): `HIGH`/`CRITICAL` → crisis channel + CRT ping,
    /// `MEDIUM` → monitor channel, no ping, `LOW`/`SAFE` → no alert.
    pub fn route(&self, severity: Severity) -> RouteDecision {
        let state = self.state.read().unwrap();
        match severity {
            Severity::Critical | Severity::High => RouteDecision {
                target_channel: Some(state.crisis_channel.clone()),
                ping_crt: true,
            },
            Severity::Medium => RouteDecision {
                target_channel: Some(state.monitor_channel.clone()),
                ping_crt: false,
            },
            Severity::Low | Severity::Safe => RouteDecision::no_alert(),
        }
    }
}

fn clamp_sensitivity(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(SENSITIVITY_MIN, SENSITIVITY_MAX)
    } else {
        DEFAULT_SENSITIVITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ChannelPolicy {
        ChannelPolicy::new(
            vec![ChannelId::from("c_general")],
            1.0,
            ChannelId::from("c_crisis"),
            ChannelId::from("c_monitor"),
        )
    }

    #[test]
    fn routes_high_and_critical_to_crisis_with_ping() {
        let p = policy();
        for sev in [Severity::High, Severity::Critical] {
            let r = p.route(sev);
            assert_eq!(r.target_channel, Some(ChannelId::from("c_crisis")));
            assert!(r.ping_crt);
        }
    }

    #[test]
    fn routes_medium_to_monitor_without_ping() {
        let r = policy().route(Severity::Medium);
        assert_eq!(r.target_channel, Some(ChannelId::from("c_monitor")));
        assert!(!r.ping_crt);
    }

    #[test]
    fn low_and_safe_produce_no_alert() {
        let p = policy();
        assert_eq!(p.route(Severity::Low), RouteDecision::no_alert());
        assert_eq!(p.route(Severity::Safe), RouteDecision::no_alert());
    }

    #[test]
    fn sensitivity_override_clamped() {
        let p = policy();
        p.set_sensitivity(ChannelId::from("c_wreck"), 5.0);
        assert_eq!(p.sensitivity(&ChannelId::from("c_wreck")), SENSITIVITY_MAX);
        p.set_sensitivity(ChannelId::from("c_wreck2"), 0.01);
        assert_eq!(p.sensitivity(&ChannelId::from("c_wreck2")), SENSITIVITY_MIN);
    }

    #[test]
    fn unmonitored_channel_falls_back_to_default_sensitivity() {
        let p = policy();
        assert_eq!(p.sensitivity(&ChannelId::from("c_unset")), 1.0);
    }

    #[test]
    fn is_monitored_reflects_set() {
        let p = policy();
        assert!(p.is_monitored(&ChannelId::from("c_general")));
        assert!(!p.is_monitored(&ChannelId::from("c_other")));
    }
}
