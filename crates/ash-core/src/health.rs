use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reachability of a single collaborator (NLP, LLM, KV, gateway...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: String,
    pub reachable: bool,
    pub detail: Option<String>,
}

impl ComponentStatus {
    pub fn ok(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reachable: true,
            detail: None,
        }
    }

    pub fn down(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reachable: false,
            detail: Some(detail.into()),
        }
    }
}

/// JSON-tree snapshot backing `GET /health/detailed` and `/ash health`
/// (spec §4.13, §4.14).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub gateway_connected: bool,
    pub components: Vec<ComponentStatus>,
}

impl HealthSnapshot {
    /// Readiness gate: gateway connected and every required collaborator
    /// reachable (spec §4.14 `/health/ready`).
    pub fn is_ready(&self) -> bool {
        self.gateway_connected && self.components.iter().all(|c| c.reachable)
    }
}

/// Anything that can produce a [`HealthSnapshot`] on demand. Implemented by
/// the gateway's aggregator so both the HTTP surface and `/ash health`
/// consume the same readiness logic.
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn snapshot(&self) -> HealthSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_requires_gateway_and_all_components() {
        let healthy = HealthSnapshot {
            gateway_connected: true,
            components: vec![ComponentStatus::ok("kv"), ComponentStatus::ok("nlp")],
        };
        assert!(healthy.is_ready());

        let degraded = HealthSnapshot {
            gateway_connected: true,
            components: vec![ComponentStatus::ok("kv"), ComponentStatus::down("nlp", "timeout")],
        };
        assert!(!degraded.is_ready());

        let disconnected = HealthSnapshot {
            gateway_connected: false,
            components: vec![ComponentStatus::ok("kv")],
        };
        assert!(!disconnected.is_ready());
    }
}
