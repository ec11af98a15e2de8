//! Prometheus metrics for backoffice-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// RPC call counter by action and outcome.
pub static RPC_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_rpc_requests_total",
        "Total number of RPC calls",
        &["action", "outcome"] // success, error
    )
    .expect("Failed to register rpc_requests_total")
});

/// RPC call duration histogram by action.
pub static RPC_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "backoffice_rpc_request_duration_seconds",
        "RPC call duration in seconds",
        &["action"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register rpc_request_duration")
});

/// DSR workflow transitions by action.
pub static DSR_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_dsr_transitions_total",
        "Total number of DSR status transitions",
        &["action"] // submit, approve, reject, post, acknowledge
    )
    .expect("Failed to register dsr_transitions_total")
});

/// Invoice lifecycle events by resulting status.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_invoices_total",
        "Total number of invoice status changes",
        &["status"] // ready, paid, void
    )
    .expect("Failed to register invoices_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "backoffice_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Store operation latency by backend and operation.
pub static STORE_OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "backoffice_store_operation_duration_seconds",
        "Store operation duration in seconds",
        &["backend", "operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register store_operation_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&RPC_REQUESTS_TOTAL);
    Lazy::force(&RPC_REQUEST_DURATION);
    Lazy::force(&DSR_TRANSITIONS_TOTAL);
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&STORE_OPERATION_DURATION);
}

/// Record one RPC call.
pub fn record_rpc_request(action: &str, outcome: &str, duration_secs: f64) {
    RPC_REQUESTS_TOTAL.with_label_values(&[action, outcome]).inc();
    RPC_REQUEST_DURATION
        .with_label_values(&[action])
        .observe(duration_secs);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
