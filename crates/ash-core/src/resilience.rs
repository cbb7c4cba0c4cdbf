//! Retry backoff and circuit-breaker primitives shared by every outbound HTTP
//! collaborator (`ash-nlp`, `ash-llm`). Generalized from the reconnect-with-
//! backoff idiom used for channel adapters elsewhere in the stack, with the
//! jitter source swapped for `rand` and the breaker upgraded to an explicit
//! three-state machine so its state can be reported as a metric (§4.5).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Exponential backoff with full jitter: `delay = random(0, min(cap, base * 2^attempt))`.
///
/// `attempt` is 0-based. Matches the NLP/LLM client contract in spec §4.5:
/// base 250 ms, cap 4 s.
pub fn full_jitter_backoff(attempt: u32, base_ms: u64, cap_ms: u64) -> std::time::Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(20)).min(cap_ms);
    let jittered = if exp == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=exp)
    };
    std::time::Duration::from_millis(jittered)
}

/// Observable circuit-breaker state, exposed via metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Per-endpoint circuit breaker: closed → open after `threshold` consecutive
/// failures → half-open after `cooldown` elapses (a single probe allowed
/// through) → closed again on a successful probe, or back to open on failure.
///
/// A value, not a global: each `NlpClient`/`LlmClient` owns one per endpoint
/// (spec §4.5, §9 "Dynamic dispatch").
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    tripped_at: AtomicU64,
    /// Set while a half-open probe is in flight, so concurrent callers don't
    /// all pile through the single allowed probe at once.
    probe_in_flight: AtomicU32,
    threshold: u32,
    cooldown_secs: u64,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            tripped_at: AtomicU64::new(0),
            probe_in_flight: AtomicU32::new(0),
            threshold,
            cooldown_secs,
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Current observable state.
    pub fn state(&self) -> CircuitState {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures < self.threshold {
            return CircuitState::Closed;
        }
        let tripped = self.tripped_at.load(Ordering::Relaxed);
        if Self::now_secs().saturating_sub(tripped) < self.cooldown_secs {
            CircuitState::Open
        } else {
            CircuitState::HalfOpen
        }
    }

    /// Returns `true` if a call should be allowed through right now. In the
    /// half-open state, only the first caller to observe it gets `true`;
    /// later concurrent callers are rejected until the probe resolves.
    pub fn allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                self.probe_in_flight
                    .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            }
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.tripped_at.store(0, Ordering::Relaxed);
        self.probe_in_flight.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let prev = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= self.threshold {
            self.tripped_at.store(Self::now_secs(), Ordering::Relaxed);
        }
        self.probe_in_flight.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_until_threshold() {
        let cb = CircuitBreaker::new(3, 60);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_failures() {
        let cb = CircuitBreaker::new(2, 60);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_allows_single_probe() {
        let cb = CircuitBreaker::new(1, 0);
        cb.record_failure();
        // cooldown_secs = 0, so it's half-open immediately.
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow());
        // A second concurrent caller is rejected while the probe is in flight.
        assert!(!cb.allow());
    }

    #[test]
    fn backoff_never_exceeds_cap() {
        for attempt in 0..10 {
            let d = full_jitter_backoff(attempt, 250, 4000);
            assert!(d.as_millis() <= 4000);
        }
    }
}
