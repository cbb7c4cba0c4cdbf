//! Aggregates collaborator reachability into the [`HealthSnapshot`] backing
//! `GET /health/ready`, `GET /health/detailed`, and `/ash health` (spec
//! §4.14).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ash_core::health::{ComponentStatus, HealthSnapshot, HealthSource};
use ash_kv::KvStore;
use async_trait::async_trait;

/// A probe key touched only by the readiness check, never by real history,
/// so it never collides with a user's data and never needs a TTL.
const KV_PROBE_KEY: &str = "ash:health:probe";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Reachability aggregator for the required collaborators named in spec
/// §4.14 (`/health/ready` must check NLP and KV). This hits the NLP
/// classifier's own `GET /health` directly with a short-lived client rather
/// than sharing `ash-nlp`'s `NlpClient`, since that client's circuit breaker
/// is scoped to the classification call path, not this independent probe.
pub struct GatewayHealth {
    kv: KvStore,
    http: reqwest::Client,
    nlp_base_url: String,
    gateway_connected: Arc<AtomicBool>,
}

impl GatewayHealth {
    pub fn new(kv: KvStore, nlp_base_url: impl Into<String>, gateway_connected: Arc<AtomicBool>) -> Self {
        Self {
            kv,
            http: reqwest::Client::new(),
            nlp_base_url: nlp_base_url.into(),
            gateway_connected,
        }
    }
}

#[async_trait]
impl HealthSource for GatewayHealth {
    async fn snapshot(&self) -> HealthSnapshot {
        let kv_status = match self.kv.exists(KV_PROBE_KEY).await {
            Ok(_) => ComponentStatus::ok("kv"),
            Err(e) => ComponentStatus::down("kv", e.to_string()),
        };

        let nlp_status = match self
            .http
            .get(format!("{}/health", self.nlp_base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => ComponentStatus::ok("nlp"),
            Ok(resp) => ComponentStatus::down("nlp", format!("status {}", resp.status())),
            Err(e) => ComponentStatus::down("nlp", e.to_string()),
        };

        HealthSnapshot {
            gateway_connected: self.gateway_connected.load(Ordering::Relaxed),
            components: vec![kv_status, nlp_status],
        }
    }
}
