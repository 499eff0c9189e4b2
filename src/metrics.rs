// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Steward operator.
//!
//! All metrics carry the namespace prefix `steward_app` (prometheus-safe version of
//! "app.steward.dev").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Reconciliations by outcome and their duration
//! - **Dependent Metrics** - Writes to owned objects by kind and verb
//! - **Queue Metrics** - Requeues by reason and the current queue depth
//! - **Error Metrics** - Failed cluster calls by category
//!
//! # Example
//!
//! ```rust,no_run
//! use steward::metrics::record_reconciliation;
//!
//! record_reconciliation("converged", std::time::Duration::from_millis(40));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all Steward metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "steward_app";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by outcome
///
/// Labels:
/// - `outcome`: `converged`, `progressing`, `failed`, `conflict`, `invalid`,
///   `absent`, `error`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of ManagedService reconciliations by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `outcome`: as for [`RECONCILIATION_TOTAL`]
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of ManagedService reconciliations in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Dependent Metrics
// ============================================================================

/// Total number of writes to dependent objects
///
/// Labels:
/// - `kind`: Kind of the dependent (`Deployment`, `Service`, `ConfigMap`)
/// - `verb`: `create`, `update` or `delete`
pub static DEPENDENT_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dependent_writes_total"),
        "Total number of writes to dependent objects by kind and verb",
    );
    let counter = CounterVec::new(opts, &["kind", "verb"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Queue Metrics
// ============================================================================

/// Total number of requeue operations
///
/// Labels:
/// - `reason`: `backoff` or `after`
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Keys waiting in the work queue
pub static QUEUE_DEPTH: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_queue_depth"),
        "Number of keys waiting in the work queue",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of failed cluster calls by category
///
/// Labels:
/// - `error_type`: [`ClusterError::metric_label`](crate::errors::ClusterError::metric_label)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of failed cluster calls by error category",
    );
    let counter = CounterVec::new(opts, &["error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a finished reconciliation
///
/// # Arguments
/// * `outcome` - Outcome label
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation(outcome: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[outcome]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Record a write to a dependent object
pub fn record_dependent_write(kind: &str, verb: &str) {
    DEPENDENT_WRITES_TOTAL.with_label_values(&[kind, verb]).inc();
}

/// Record a requeue
pub fn record_requeue(reason: &str) {
    REQUEUE_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a failed cluster call
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Publish the current queue depth
#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(depth as f64);
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
