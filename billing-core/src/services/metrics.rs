//! Metrics module for billing-core.
//! Provides Prometheus metrics for pipeline outcomes and settlement volume.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Pipeline duration histogram, labelled by terminal outcome
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "billing_pipeline_duration_seconds",
            "Usage event pipeline duration",
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        ),
        &["outcome"]
    )
    .expect("Failed to register PIPELINE_DURATION")
});

/// Usage events counter by outcome
pub static USAGE_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Settlement attempts by method and status
pub static SETTLEMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Quota rejections by service type
pub static QUOTA_REJECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Audit events published by kind
pub static EVENTS_PUBLISHED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Best-effort publication failures by channel
pub static PUBLISH_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Settled amount by currency and method (monetary tracking)
pub static SETTLED_AMOUNT_TOTAL: OnceLock<prometheus::CounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    USAGE_EVENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_usage_events_total",
                "Total usage events by pipeline outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register USAGE_EVENTS_TOTAL")
    });

    SETTLEMENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_settlements_total",
                "Total settlement attempts by method and status"
            ),
            &["method", "status"]
        )
        .expect("Failed to register SETTLEMENTS_TOTAL")
    });

    QUOTA_REJECTIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_quota_rejections_total",
                "Total quota admission rejections by service type"
            ),
            &["service_type"]
        )
        .expect("Failed to register QUOTA_REJECTIONS_TOTAL")
    });

    EVENTS_PUBLISHED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_events_published_total",
                "Total audit events published by kind"
            ),
            &["kind"]
        )
        .expect("Failed to register EVENTS_PUBLISHED_TOTAL")
    });

    PUBLISH_FAILURES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_publish_failures_total",
                "Best-effort event publication failures by channel"
            ),
            &["channel"]
        )
        .expect("Failed to register PUBLISH_FAILURES_TOTAL")
    });

    SETTLED_AMOUNT_TOTAL.get_or_init(|| {
        prometheus::register_counter_vec!(
            prometheus::opts!(
                "billing_settled_amount_total",
                "Total settled amount by currency and method"
            ),
            &["currency", "method"]
        )
        .expect("Failed to register SETTLED_AMOUNT_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*PIPELINE_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a terminal pipeline outcome.
pub fn record_usage_event(outcome: &str) {
    if let Some(counter) = USAGE_EVENTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record a settlement attempt.
pub fn record_settlement(method: &str, status: &str) {
    if let Some(counter) = SETTLEMENTS_TOTAL.get() {
        counter.with_label_values(&[method, status]).inc();
    }
}

/// Record a quota rejection.
pub fn record_quota_rejection(service_type: &str) {
    if let Some(counter) = QUOTA_REJECTIONS_TOTAL.get() {
        counter.with_label_values(&[service_type]).inc();
    }
}

/// Record a published audit event.
pub fn record_event_published(kind: &str) {
    if let Some(counter) = EVENTS_PUBLISHED_TOTAL.get() {
        counter.with_label_values(&[kind]).inc();
    }
}

/// Record a best-effort publication failure.
pub fn record_publish_failure(channel: &str) {
    if let Some(counter) = PUBLISH_FAILURES_TOTAL.get() {
        counter.with_label_values(&[channel]).inc();
    }
}

/// Record a settled amount for financial tracking.
pub fn record_settled_amount(currency: &str, method: &str, amount: f64) {
    if let Some(counter) = SETTLED_AMOUNT_TOTAL.get() {
        counter
            .with_label_values(&[currency, method])
            .inc_by(amount.abs());
    }
}
