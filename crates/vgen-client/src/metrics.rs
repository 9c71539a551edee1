//! Client metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is up to
//! the embedding application.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total API requests by operation and outcome (HTTP status or error kind).
    pub const REQUESTS_TOTAL: &str = "vgen_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "vgen_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vgen_latency_seconds";

    /// Status polls by observed job status.
    pub const POLLS_TOTAL: &str = "vgen_polls_total";
}

/// Record metrics for a completed API request.
pub fn record_request(operation: &str, outcome: &str, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record one status poll.
pub fn record_poll(status: &str) {
    counter!(
        names::POLLS_TOTAL,
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::POLLS_TOTAL.starts_with("vgen_"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("create_job", "200", 12.5);
        record_retry("submit");
        record_poll("running");
    }
}
