//! Prometheus metrics for observability.
//!
//! This module provides the HTTP-level metrics of the server and gathers the
//! pipeline metrics declared in `diffusion_core::metrics`:
//! - HTTP request metrics (latency, counts)
//! - Request signature rejections
//! - Client readiness and worker activity (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "diffusion_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("diffusion_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "diffusion_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Inbound requests rejected by signature verification.
pub static SIGNATURE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "diffusion_signature_failures_total",
            "Inbound requests rejected by signature verification",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Status (collected dynamically)
// =============================================================================

/// Whether each external client is constructed (1) or still pending (0).
pub static CLIENT_READY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("diffusion_client_ready", "External client readiness"),
        &["client"],
    )
    .unwrap()
});

/// Whether the worker is running.
pub static WORKER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "diffusion_worker_running",
        "Whether the pipeline worker is running (1) or not (0)",
    )
    .unwrap()
});

/// Whether a generation call is in progress.
pub static GENERATION_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "diffusion_generation_active",
        "Whether a generation call is in progress (1) or not (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(SIGNATURE_FAILURES_TOTAL.clone()))
        .unwrap();

    // Pipeline status
    registry.register(Box::new(CLIENT_READY.clone())).unwrap();
    registry.register(Box::new(WORKER_RUNNING.clone())).unwrap();
    registry
        .register(Box::new(GENERATION_ACTIVE.clone()))
        .unwrap();

    // Core metrics (intake, generation, delivery, status edits)
    for metric in diffusion_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the moment of the scrape.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let readiness = state.readiness();
    for (client, ready) in [
        ("queue", readiness.queue),
        ("storage", readiness.storage),
        ("chat", readiness.chat),
    ] {
        CLIENT_READY.with_label_values(&[client]).set(ready as i64);
    }

    match state.worker() {
        Some(worker) => {
            let status = worker.status().await;
            WORKER_RUNNING.set(status.running as i64);
            GENERATION_ACTIVE.set(status.current_job.is_some() as i64);
        }
        None => {
            WORKER_RUNNING.set(0);
            GENERATION_ACTIVE.set(0);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/objects/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/objects/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/jobs/12345";
        assert_eq!(normalize_path(path), "/api/v1/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/slack/commands"), "/slack/commands");
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }

    #[test]
    fn test_encode_includes_core_metrics() {
        diffusion_core::metrics::JOBS_SUBMITTED
            .with_label_values(&["queued"])
            .inc();
        HTTP_REQUESTS_IN_FLIGHT.set(0);

        let output = encode_metrics();
        assert!(output.contains("diffusion_jobs_submitted_total"));
        assert!(output.contains("diffusion_http_requests_in_flight"));
    }
}
