use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

// --- Dependency Metrics ---

pub static DEPENDENCY_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "titan_capture_dependency_latency_seconds",
        "Latency of calls to the order store and broker",
        &["dependency", "success"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("dependency_latency histogram")
});

// --- Capture Metrics ---

pub static CAPTURED_ORDERS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_capture_orders_total",
        "Total orders stored and announced"
    )
    .expect("captured_orders counter")
});

pub static CAPTURE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "titan_capture_failures_total",
        "Total failed captures by stage",
        &["stage"]
    )
    .expect("capture_failures counter")
});

// --- Telemetry Export ---

pub static TELEMETRY_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_capture_telemetry_dropped_total",
        "Telemetry items dropped because the export queue was full or closed"
    )
    .expect("telemetry_dropped counter")
});

pub static TELEMETRY_EXPORTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_capture_telemetry_exported_total",
        "Telemetry items accepted by the ingestion endpoint"
    )
    .expect("telemetry_exported counter")
});

pub fn observe_dependency(dependency: &str, success: bool, duration_sec: f64) {
    DEPENDENCY_LATENCY
        .with_label_values(&[dependency, if success { "true" } else { "false" }])
        .observe(duration_sec);
}

pub fn inc_captured_orders() {
    CAPTURED_ORDERS.inc();
}

pub fn inc_capture_failures(stage: &str) {
    CAPTURE_FAILURES.with_label_values(&[stage]).inc();
}

pub fn inc_telemetry_dropped() {
    TELEMETRY_DROPPED.inc();
}

pub fn inc_telemetry_exported(count: u64) {
    TELEMETRY_EXPORTED.inc_by(count);
}

/// Render the default registry in the prometheus text format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        observe_dependency("order-queue", true, 0.02);
        inc_capture_failures("store-failed");

        let text = render();
        assert!(text.contains("titan_capture_dependency_latency_seconds"));
        assert!(text.contains("titan_capture_failures_total{stage=\"store-failed\"}"));
    }
}
