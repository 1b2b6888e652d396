//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming for the generation pipeline.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all FreightPress metrics
pub const METRICS_PREFIX: &str = "freightpress";

/// Buckets for generation latency; upstream calls run seconds to minutes
pub const GENERATION_BUCKETS: &[f64] = &[
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m - client timeout
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Generation metrics
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation API requests"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation request latency in seconds"
    );

    describe_counter!(
        format!("{}_generation_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation API failures"
    );

    // Draft batch metrics
    describe_counter!(
        format!("{}_drafts_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total draft articles persisted"
    );

    describe_counter!(
        format!("{}_draft_items_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Total batch items dropped after generation, parse, or persistence failure"
    );

    // Publish metrics
    describe_counter!(
        format!("{}_articles_published_total", METRICS_PREFIX),
        Unit::Count,
        "Total articles published"
    );

    describe_counter!(
        format!("{}_publish_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Total body generation task failures"
    );

    // Queue metrics
    describe_counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages processed"
    );

    tracing::info!("Metrics registered");
}

/// Record one generation API call
pub fn record_generation(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_generation_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Record the outcome of one draft batch item
pub fn record_draft_item(created: bool, reason: &str) {
    if created {
        counter!(format!("{}_drafts_created_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(
            format!("{}_draft_items_skipped_total", METRICS_PREFIX),
            "reason" => reason.to_string()
        )
        .increment(1);
    }
}

/// Record the outcome of one body generation task
pub fn record_publish(success: bool) {
    if success {
        counter!(format!("{}_articles_published_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_publish_failures_total", METRICS_PREFIX)).increment(1);
    }
}

/// Record one processed queue message
pub fn record_queue_message(outcome: &str) {
    counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
