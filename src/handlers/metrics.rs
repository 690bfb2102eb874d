use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

use crate::AppState;

pub struct MetricsState {
    pub handle: PrometheusHandle,
}

const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Installs the global Prometheus recorder. Matching counters
/// (`swap_match_runs_total` and friends) are registered lazily on first use.
pub fn setup_metrics_recorder() -> Result<MetricsState, String> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )
        .map_err(|e| format!("failed to set histogram buckets: {}", e))?
        .install_recorder()
        .map_err(|e| format!("failed to install Prometheus recorder: {}", e))?;

    Ok(MetricsState { handle })
}

/// GET /metrics in Prometheus text format
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.handle.render())
}
