// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the private DNS operator.
//!
//! All metrics carry the namespace prefix `private_dns_`.
//!
//! # Metrics Categories
//!
//! - **Event Metrics** - Pod events handled by the reconciler and their outcomes
//! - **Record Store Metrics** - Cloud DNS operations and their outcomes
//! - **Scan Metrics** - Periodic full-zone reconciliation runs
//! - **Error Metrics** - Failures by operation and error class
//!
//! # Example
//!
//! ```rust,no_run
//! use private_dns::metrics::record_event;
//!
//! // Record a pod event that produced a DNS record
//! record_event("added", "synced", std::time::Duration::from_millis(40));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "private_dns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Event Metrics
// ============================================================================

/// Total number of pod events handled
///
/// Labels:
/// - `event`: `added`, `updated`, `deleted`
/// - `outcome`: `synced`, `pending`, `skipped`, `error`
pub static EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_events_total"),
        "Total number of pod events handled by event type and outcome",
    );
    let counter = CounterVec::new(opts, &["event", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Time spent handling one pod event, including IP waits
pub static EVENT_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_event_duration_seconds"),
        "Duration of pod event handling in seconds by event type",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Pods waiting for an IP to be written
pub static PENDING_INSTANCES: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_pending_instances"),
        "Number of pods whose record is waiting for an IP",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Pods that could not be given a record name
///
/// Labels:
/// - `reason`: e.g. `missing_owner`
pub static SKIPPED_INSTANCES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_skipped_instances_total"),
        "Total number of pods skipped because no record name could be derived",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Record Store Metrics
// ============================================================================

/// Total number of record store operations
///
/// Labels:
/// - `operation`: `create`, `delete`, `delete_stale`
/// - `outcome`: `created`, `unchanged`, `replaced`, `deleted`, `absent`, `mismatch`
pub static RECORD_STORE_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_record_operations_total"),
        "Total number of Cloud DNS record operations by operation and outcome",
    );
    let counter = CounterVec::new(opts, &["operation", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Scan Metrics
// ============================================================================

/// Total number of periodic scans
///
/// Labels:
/// - `outcome`: `success`, `partial`, `skipped`
pub static SCANS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_scans_total"),
        "Total number of full-zone reconciliation scans by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of periodic scans
pub static SCAN_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_scan_duration_seconds"),
        "Duration of full-zone reconciliation scans in seconds",
    )
    .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Managed records with no matching pod found by the last scan
pub static STALE_RECORDS: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_stale_records"),
        "Number of managed A records with no matching pod in the last scan",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by operation and error class
///
/// Labels:
/// - `operation`: e.g. `event`, `scan_upsert`, `scan_list`
/// - `error_class`: `retryable`, `permanent`, `conflict`, `cancelled`, `source`, `naming`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by operation and error class",
    );
    let counter = CounterVec::new(opts, &["operation", "error_class"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a handled pod event
///
/// # Arguments
/// * `event` - Event kind (`added`, `updated`, `deleted`)
/// * `outcome` - What happened (`synced`, `pending`, `skipped`, `error`)
/// * `duration` - Time spent handling the event
pub fn record_event(event: &str, outcome: &str, duration: Duration) {
    EVENTS_TOTAL.with_label_values(&[event, outcome]).inc();
    EVENT_DURATION_SECONDS
        .with_label_values(&[event])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of a record store operation
pub fn record_store_operation(operation: &str, outcome: &str) {
    RECORD_STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record an error
///
/// # Arguments
/// * `operation` - Where the error occurred
/// * `error_class` - Category from [`crate::dns_errors::SyncError::class`]
pub fn record_error(operation: &str, error_class: &str) {
    ERRORS_TOTAL
        .with_label_values(&[operation, error_class])
        .inc();
}

/// Set the number of pods waiting for an IP
#[allow(clippy::cast_precision_loss)]
pub fn set_pending_instances(count: usize) {
    PENDING_INSTANCES.set(count as f64);
}

/// Record a pod skipped because no record name could be derived
pub fn record_skipped_instance(reason: &str) {
    SKIPPED_INSTANCES_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a completed or skipped scan
pub fn record_scan(outcome: &str, duration: Duration) {
    SCANS_TOTAL.with_label_values(&[outcome]).inc();
    SCAN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Set the number of stale records found by the last scan
#[allow(clippy::cast_precision_loss)]
pub fn set_stale_records(count: usize) {
    STALE_RECORDS.set(count as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
