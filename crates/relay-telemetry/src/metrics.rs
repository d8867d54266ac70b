//! Prometheus metrics for the relay.
//!
//! All metrics follow the naming convention: `relay_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: tool calls and inbound executor frames
//! - **Gauge**: connected executors and pending requests
//! - **Histogram**: tool call duration

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // TOOL FRONTEND
    // =========================================================================

    /// Tool calls by tool name and outcome
    pub static ref TOOL_CALLS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_tool_calls_total", "Tool calls handled by the relay"),
        &["tool", "outcome"]  // outcome: success/executor_error/timeout/expired/no_executor/invalid
    ).expect("metric creation failed");

    /// Time from tool call to resolution
    pub static ref TOOL_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "relay_tool_call_duration_seconds",
            "Time from tool call to executor outcome"
        ).buckets(exponential_buckets(0.005, 2.0, 16).expect("valid buckets")),
        &["tool"]
    ).expect("metric creation failed");

    // =========================================================================
    // EXECUTORS
    // =========================================================================

    /// Executor connections currently registered
    pub static ref EXECUTORS_CONNECTED: IntGauge = IntGauge::new(
        "relay_executors_connected",
        "Executor connections currently open"
    ).expect("metric creation failed");

    /// Requests waiting for an executor reply
    pub static ref REQUESTS_PENDING: IntGauge = IntGauge::new(
        "relay_requests_pending",
        "Requests waiting for an executor reply"
    ).expect("metric creation failed");

    /// Frames received from executors by what the router did with them
    pub static ref INBOUND_FRAMES: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_inbound_frames_total", "Frames received from executors"),
        &["disposition"]  // disposition: resolved/late/unknown/malformed/reply/oversized
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are left alone.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TOOL_CALLS.clone()),
        Box::new(TOOL_CALL_DURATION.clone()),
        Box::new(EXECUTORS_CONNECTED.clone()),
        Box::new(REQUESTS_PENDING.clone()),
        Box::new(INBOUND_FRAMES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: prometheus::Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the histogram child labelled `label`.
    pub fn new(histogram: &HistogramVec, label: &str) -> Self {
        Self {
            histogram: histogram.with_label_values(&[label]),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_encode_includes_relay_metrics() {
        register_metrics().unwrap();
        TOOL_CALLS.with_label_values(&["browser-navigate", "success"]).inc();
        INBOUND_FRAMES.with_label_values(&["resolved"]).inc();

        let text = encode_metrics().unwrap();
        assert!(text.contains("relay_tool_calls_total"));
        assert!(text.contains("relay_inbound_frames_total"));
        assert!(text.contains("relay_executors_connected"));
    }

    #[test]
    fn test_histogram_timer_observes_on_drop() {
        let before = TOOL_CALL_DURATION
            .with_label_values(&["create-post"])
            .get_sample_count();
        {
            let _timer = HistogramTimer::new(&TOOL_CALL_DURATION, "create-post");
        }
        let after = TOOL_CALL_DURATION
            .with_label_values(&["create-post"])
            .get_sample_count();
        assert_eq!(after, before + 1);
    }
}
