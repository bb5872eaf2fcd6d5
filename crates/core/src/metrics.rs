//! Prometheus metrics for the job pipeline.
//!
//! The server registers [`all_metrics`] with its registry and serves them at
//! `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Intake
// =============================================================================

/// Commands handled by intake, by result.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("diffusion_jobs_submitted_total", "Commands handled by intake"),
        &["result"], // "queued", "unauthorized", "unknown_command", "failed"
    )
    .unwrap()
});

/// Requests whose image count was capped.
pub static IMAGE_COUNT_CLAMPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "diffusion_image_count_clamped_total",
        "Requests whose image count exceeded the maximum",
    )
    .unwrap()
});

// =============================================================================
// Worker
// =============================================================================

/// Queue messages received by the worker, by decode result.
pub static JOBS_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("diffusion_jobs_received_total", "Queue messages received"),
        &["result"], // "accepted", "nacked", "dropped"
    )
    .unwrap()
});

/// Generation calls by result.
pub static GENERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("diffusion_generations_total", "Generation backend calls"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Generation call duration in seconds.
pub static GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "diffusion_generation_duration_seconds",
            "Duration of generation backend calls",
        )
        .buckets(vec![1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Object uploads by result.
pub static UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("diffusion_uploads_total", "Artifact uploads"),
        &["result"], // "stored", "already_exists", "failed"
    )
    .unwrap()
});

/// Delivery tasks by result.
pub static DELIVERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("diffusion_deliveries_total", "Completed delivery tasks"),
        &["result"], // "delivered", "failed"
    )
    .unwrap()
});

/// Delivery tasks currently running.
pub static DELIVERIES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "diffusion_deliveries_in_flight",
        "Delivery tasks currently running",
    )
    .unwrap()
});

// =============================================================================
// Status
// =============================================================================

/// Status message edits by target state and result.
pub static STATUS_EDITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("diffusion_status_edits_total", "Status message edits"),
        &["state", "result"], // result: "applied", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(IMAGE_COUNT_CLAMPED.clone()),
        Box::new(JOBS_RECEIVED.clone()),
        Box::new(GENERATIONS.clone()),
        Box::new(GENERATION_DURATION.clone()),
        Box::new(UPLOADS.clone()),
        Box::new(DELIVERIES.clone()),
        Box::new(DELIVERIES_IN_FLIGHT.clone()),
        Box::new(STATUS_EDITS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        JOBS_SUBMITTED.with_label_values(&["queued"]).inc();
        assert!(!registry.gather().is_empty());
    }
}
