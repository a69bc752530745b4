//! Prometheus metrics.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use photo_advisor_core::{Error, Result};

/// Install the global Prometheus recorder and return its render handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Count one HTTP request and record its latency.
pub fn track_request(method: &str, path: &str, status: u16, latency_sec: f64) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(latency_sec);
}

/// Count one finished analysis by outcome (`answered`, `degraded`, `rejected`, `failed`).
pub fn track_analysis(outcome: &'static str) {
    metrics::counter!("analysis_outcomes_total", "outcome" => outcome).increment(1);
}

/// Count one audit notification attempt.
pub fn track_notification(kind: &'static str, delivered: bool) {
    metrics::counter!(
        "notifications_total",
        "kind" => kind,
        "delivered" => if delivered { "true" } else { "false" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            track_analysis("answered");
            track_notification("photo", false);
            track_request("POST", "/analyze", 200, 0.25);
        });

        let rendered = handle.render();
        assert!(rendered.contains("analysis_outcomes_total{outcome=\"answered\"} 1"));
        assert!(rendered.contains("notifications_total"));
        assert!(rendered.contains("delivered=\"false\""));
        assert!(rendered.contains("http_requests_total"));
    }
}
