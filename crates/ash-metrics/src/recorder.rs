use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-global Prometheus recorder and return a handle that
/// can render the current snapshot as text (spec §4.14 `GET /metrics`).
///
/// Must be called exactly once, before any `metrics::counter!`/`histogram!`
/// call site executes — mirrored here as a thin wrapper so `ash-gateway`'s
/// `main` doesn't need to know which exporter crate backs the `metrics`
/// facade.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}
