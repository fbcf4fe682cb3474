//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming.

use metrics::{counter, describe_counter, describe_histogram, Unit};

/// Metrics prefix for all Gabber metrics
pub const METRICS_PREFIX: &str = "gabber";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_sessions_created_total", METRICS_PREFIX),
        Unit::Count,
        "Interview sessions uploaded"
    );

    describe_counter!(
        format!("{}_consent_updates_total", METRICS_PREFIX),
        Unit::Count,
        "Consent decisions recorded"
    );

    describe_counter!(
        format!("{}_annotations_created_total", METRICS_PREFIX),
        Unit::Count,
        "Annotations created"
    );

    describe_counter!(
        format!("{}_comments_created_total", METRICS_PREFIX),
        Unit::Count,
        "Annotation comments created"
    );
}

pub fn record_session_created() {
    counter!(format!("{}_sessions_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_consent_update(consent: &str) {
    counter!(
        format!("{}_consent_updates_total", METRICS_PREFIX),
        "consent" => consent.to_string()
    )
    .increment(1);
}

pub fn record_annotation_created() {
    counter!(format!("{}_annotations_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_comment_created() {
    counter!(format!("{}_comments_created_total", METRICS_PREFIX)).increment(1);
}
