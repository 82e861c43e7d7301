// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for ddnsync.
//!
//! All metrics carry the `ddnsync_` prefix and live in [`METRICS_REGISTRY`],
//! which `ddnsync run` exposes on `/metrics` when a bind address is configured.
//!
//! # Metrics Categories
//!
//! - **Update Metrics** - Dynamic updates by direction, action and result
//! - **Authority Metrics** - Outcomes of live SOA checks
//! - **Error Metrics** - Caught failures by reason
//! - **Job Metrics** - Inventory events received, jobs executed and their duration
//!
//! # Example
//!
//! ```rust,no_run
//! use ddnsync::metrics::{gather_metrics, record_job};
//!
//! record_job("dns_create", std::time::Duration::from_millis(120));
//! println!("{}", gather_metrics().unwrap());
//! ```

use crate::dns_errors::DnsError;
use crate::model::{Action, Direction, ResultCode};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all ddnsync metrics
const METRICS_NAMESPACE: &str = "ddnsync";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Update Metrics
// ============================================================================

/// Total number of dynamic updates by outcome
///
/// Labels:
/// - `direction`: `forward` or `reverse`
/// - `action`: `create` or `delete`
/// - `result`: response code mnemonic (`NOERROR`, `NOTAUTH`, `SERVFAIL`, ...)
pub static UPDATES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_updates_total"),
        "Total number of dynamic updates by direction, action and result",
    );
    let counter = CounterVec::new(opts, &["direction", "action", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Authority Metrics
// ============================================================================

/// Total number of live authority checks
///
/// Labels:
/// - `outcome`: `authorized`, `delegated` or `unknown`
pub static AUTHORITY_CHECKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_authority_checks_total"),
        "Total number of live SOA authority checks by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of failures degraded to a result code
///
/// Labels:
/// - `reason`: stable reason code (`SoaLookupTimeout`, `TsigVerificationFailed`, ...)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of authority, dispatch and ledger failures by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Job Metrics
// ============================================================================

/// Total number of inventory events received
///
/// Labels:
/// - `event`: `binding_saved`, `binding_deleted`, `extra_name_saved`, `extra_name_deleted`
pub static EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_events_total"),
        "Total number of inventory events received by kind",
    );
    let counter = CounterVec::new(opts, &["event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of jobs executed
///
/// Labels:
/// - `kind`: `dns_create` or `dns_delete`
pub static JOBS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_jobs_total"),
        "Total number of DNS jobs executed by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of jobs in seconds
///
/// Labels:
/// - `kind`: `dns_create` or `dns_delete`
pub static JOB_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_job_duration_seconds"),
        "Duration of DNS jobs in seconds by kind",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Helper Functions
// ============================================================================

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Forward => "forward",
        Direction::Reverse => "reverse",
    }
}

/// Record the outcome of a dynamic update
pub fn record_update(direction: Direction, action: Action, rcode: ResultCode) {
    let result = rcode.mnemonic();
    UPDATES_TOTAL
        .with_label_values(&[direction_label(direction), action.as_str(), result.as_str()])
        .inc();
}

/// Record the outcome of a live authority check
pub fn record_authority_check(outcome: &str) {
    AUTHORITY_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a failure that was caught and degraded
pub fn record_error(error: &DnsError) {
    ERRORS_TOTAL
        .with_label_values(&[error.status_reason()])
        .inc();
}

/// Record an inventory event
pub fn record_event(event: &str) {
    EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Record a finished job
///
/// # Arguments
/// * `kind` - The job kind
/// * `duration` - How long the job ran
pub fn record_job(kind: &str, duration: Duration) {
    JOBS_TOTAL.with_label_values(&[kind]).inc();
    JOB_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Gather all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if metrics cannot be encoded
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
