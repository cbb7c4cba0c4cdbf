use ash_core::{Severity, UserId};
use dashmap::DashMap;

/// Per-severity suppression windows (spec §4.7 defaults).
#[derive(Debug, Clone, Copy)]
pub struct CooldownWindows {
    pub medium_secs: u64,
    pub high_secs: u64,
    pub critical_secs: u64,
}

impl CooldownWindows {
    fn window_for(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Medium => self.medium_secs,
            Severity::High => self.high_secs,
            Severity::Critical => self.critical_secs,
            Severity::Low | Severity::Safe => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CooldownState {
    last_alert_at: i64,
    last_severity: Severity,
}

/// Per-user alert suppression window, severity-aware (spec §4.7).
///
/// In-process only — a restart resets cooldown state, which the spec
/// explicitly accepts as "worst case is an extra alert". `DashMap` provides
/// the striped-lock-per-key concurrency the spec calls for without a custom
/// sharding scheme.
pub struct CooldownGuard {
    windows: CooldownWindows,
    state: DashMap<UserId, CooldownState>,
}

impl CooldownGuard {
    pub fn new(windows: CooldownWindows) -> Self {
        Self {
            windows,
            state: DashMap::new(),
        }
    }

    /// `true` iff an alert of `severity` for `user_id` should be suppressed
    /// right now. A strictly higher severity than the last recorded alert
    /// always bypasses the window (testable property 8).
    pub fn should_suppress(&self, user_id: &UserId, severity: Severity, now: i64) -> bool {
        let Some(entry) = self.state.get(user_id) else {
            return false;
        };
        if severity > entry.last_severity {
            return false;
        }
        let window = self.windows.window_for(severity);
        now - entry.last_alert_at < window as i64
    }

    /// Record that an alert of `severity` was just dispatched for `user_id`,
    /// resetting the cooldown timer.
    pub fn record_alert(&self, user_id: &UserId, severity: Severity, now: i64) {
        self.state.insert(
            user_id.clone(),
            CooldownState {
                last_alert_at: now,
                last_severity: severity,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows() -> CooldownWindows {
        CooldownWindows {
            medium_secs: 900,
            high_secs: 600,
            critical_secs: 300,
        }
    }

    #[test]
    fn suppresses_same_severity_within_window() {
        let guard = CooldownGuard::new(windows());
        let user = UserId::from("u1");
        guard.record_alert(&user, Severity::Medium, 1_000);
        assert!(guard.should_suppress(&user, Severity::Medium, 1_100));
    }

    #[test]
    fn allows_after_window_elapses() {
        let guard = CooldownGuard::new(windows());
        let user = UserId::from("u1");
        guard.record_alert(&user, Severity::Medium, 1_000);
        assert!(!guard.should_suppress(&user, Severity::Medium, 1_000 + 901));
    }

    #[test]
    fn strictly_higher_severity_always_bypasses() {
        let guard = CooldownGuard::new(windows());
        let user = UserId::from("u1");
        guard.record_alert(&user, Severity::Medium, 1_000);
        assert!(!guard.should_suppress(&user, Severity::Critical, 1_001));
    }

    #[test]
    fn first_alert_for_user_is_never_suppressed() {
        let guard = CooldownGuard::new(windows());
        let user = UserId::from("u1");
        assert!(!guard.should_suppress(&user, Severity::High, 1_000));
    }
}
