//! Prometheus metrics for bridge observability.

use metrics::counter;

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a webhook received event.
pub fn webhook_received(source: &str, event_type: &str) {
    counter!(
        "ci_bridge_webhooks_received_total",
        "source" => source.to_string(),
        "event" => event_type.to_string()
    )
    .increment(1);
}

/// Record a downstream job queued in Jenkins.
pub fn build_triggered(job: &str) {
    counter!("ci_bridge_builds_triggered_total", "job" => job.to_string()).increment(1);
}

/// Record a commit status written to GitHub.
pub fn status_set(state: &str) {
    counter!("ci_bridge_statuses_total", "state" => state.to_string()).increment(1);
}

/// Record a failed remote call.
pub fn remote_error(service: &str) {
    counter!("ci_bridge_remote_errors_total", "service" => service.to_string()).increment(1);
}
