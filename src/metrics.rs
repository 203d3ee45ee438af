//! Operational metrics with Prometheus.
//!
//! Exposes request rates/latencies plus counters for the two outbound
//! dependencies (tracker API, LLM providers). Labels stay low-cardinality:
//! no user ids, no session ids.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "jornada_http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint", "status"]
    ).unwrap();

    /// Total HTTP requests
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jornada_http_requests_total", "Total HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    /// Outbound tracker API requests
    pub static ref TRACKER_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jornada_tracker_requests_total", "Task-tracker API requests"),
        &["endpoint", "result"]
    ).unwrap();

    /// LLM calls by provider and outcome (ok, quota, error)
    pub static ref AI_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("jornada_ai_calls_total", "LLM provider calls"),
        &["provider", "result"]
    ).unwrap();
}

/// Register all metrics with the global registry. Call once at startup.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    METRICS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(TRACKER_REQUESTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(AI_CALLS_TOTAL.clone()))?;
    Ok(())
}

/// Render all registered metrics in Prometheus text format
pub fn gather() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!("failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_gather() {
        // register_metrics may run twice across tests; duplicates are an error
        // from prometheus but the registry keeps working.
        let _ = register_metrics();

        AI_CALLS_TOTAL.with_label_values(&["gemini", "ok"]).inc();
        let text = gather();
        assert!(text.contains("jornada_ai_calls_total"));
    }
}
