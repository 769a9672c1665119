//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `templated_secret_reconciliations_total` - Total number of reconciliations
//! - `templated_secret_reconciliation_errors_total` - Reconciliations that failed with an infrastructure error
//! - `templated_secret_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `templated_secret_outcomes_total{reason}` - Pass outcomes by status reason
//! - `templated_secret_secret_writes_total{operation}` - Output Secret writes by operation
//! - `templated_secret_requeues_total{reason}` - Scheduled retries by trigger
//! - `templated_secret_watch_restarts_total` - Watch stream restarts

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "templated_secret_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "templated_secret_reconciliation_errors_total",
        "Total number of reconciliations that failed with an infrastructure error",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "templated_secret_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "templated_secret_outcomes_total",
            "Total number of reconciliation outcomes by status reason",
        ),
        &["reason"],
    )
    .expect("Failed to create OUTCOMES_TOTAL metric - this should never happen")
});

static SECRET_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "templated_secret_secret_writes_total",
            "Total number of output Secret writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create SECRET_WRITES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "templated_secret_requeues_total",
            "Total number of scheduled retries by trigger",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static WATCH_RESTARTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "templated_secret_watch_restarts_total",
        "Total number of watch stream restarts",
    )
    .expect("Failed to create WATCH_RESTARTS_TOTAL metric - this should never happen")
});

/// Register all metrics with the shared registry
///
/// # Errors
///
/// Fails if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_RESTARTS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_outcome(reason: &str) {
    OUTCOMES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_secret_writes(operation: &str) {
    SECRET_WRITES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_watch_restarts() {
    WATCH_RESTARTS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn test_labelled_counters() {
        let before = OUTCOMES_TOTAL.with_label_values(&["MissingKey"]).get();
        increment_outcome("MissingKey");
        assert!(OUTCOMES_TOTAL.with_label_values(&["MissingKey"]).get() > before);

        let before = SECRET_WRITES_TOTAL.with_label_values(&["create"]).get();
        increment_secret_writes("create");
        assert!(SECRET_WRITES_TOTAL.with_label_values(&["create"]).get() > before);
    }

    #[test]
    fn test_registry_exposes_registered_metrics() {
        let registry = Registry::new();
        registry
            .register(Box::new(REQUEUES_TOTAL.clone()))
            .unwrap();
        increment_requeues_total("error-backoff");

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("templated_secret_requeues_total{reason=\"error-backoff\"}"));
    }
}
