//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the HTTP server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Submission counts by status (collected dynamically)
//!
//! Core metrics (intake, processor, consumers) are registered alongside.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

use contentgate_core::SubmissionStatus;

use crate::state::AppState;

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
            "contentgate_http_request_duration_seconds",
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
        Opts::new("contentgate_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "contentgate_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Submission Metrics
// =============================================================================

/// Submissions currently in each status.
pub static SUBMISSIONS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "contentgate_submissions_by_status",
            "Number of submissions in each status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Register all metrics with the registry.
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

    // Submissions
    registry
        .register(Box::new(SUBMISSIONS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (intake, processor, consumers)
    for metric in contentgate_core::metrics::all_metrics() {
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

/// Refresh gauges that mirror stored state before encoding.
pub fn collect_dynamic_metrics(state: &AppState) {
    let counts = match state.submissions().status_counts() {
        Ok(counts) => counts,
        Err(e) => {
            warn!("Failed to collect submission counts: {}", e);
            return;
        }
    };

    for (status, count) in [
        (SubmissionStatus::Pending, counts.pending),
        (SubmissionStatus::Processing, counts.processing),
        (SubmissionStatus::Passed, counts.passed),
        (SubmissionStatus::Failed, counts.failed),
    ] {
        SUBMISSIONS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count);
    }
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Normalize a path for metric labels.
///
/// Submission ids are replaced with `{id}`. Unknown ids that are not UUIDs
/// collapse to a single label so arbitrary paths cannot grow the series count.
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    match result.strip_prefix("/api/submissions/") {
        Some(rest) if !rest.is_empty() && rest != "{id}" => "/api/submissions/{id}".to_string(),
        _ => result.to_string(),
    }
}
