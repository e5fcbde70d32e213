//! GatewayMetrics - Prometheus counters
//!
//! Lock-free counters updated by the frame processor and the WebSocket
//! handler, rendered in the Prometheus text exposition format (v0.0.4).

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Upper bounds (seconds) of the inference latency histogram
pub const LATENCY_BUCKETS: [f64; 7] = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Prometheus text format content type
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Gateway metrics registry
pub struct GatewayMetrics {
    frames_processed: AtomicU64,
    latency_buckets: [AtomicU64; LATENCY_BUCKETS.len()],
    latency_count: AtomicU64,
    latency_sum_micros: AtomicU64,
    detections: AtomicU64,
    violations: AtomicU64,
    errors: Mutex<BTreeMap<String, u64>>,
    active_cameras: AtomicI64,
    ws_clients: AtomicI64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            latency_buckets: Default::default(),
            latency_count: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            detections: AtomicU64::new(0),
            violations: AtomicU64::new(0),
            errors: Mutex::new(BTreeMap::new()),
            active_cameras: AtomicI64::new(0),
            ws_clients: AtomicI64::new(0),
        }
    }

    /// One frame went through inference
    pub fn record_inference(&self, elapsed: Duration) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);

        let seconds = elapsed.as_secs_f64();
        for (bound, bucket) in LATENCY_BUCKETS.iter().zip(&self.latency_buckets) {
            if seconds <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_detections(&self, count: usize) {
        self.detections.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_violation(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an error under `error_type` (e.g. "detection")
    pub fn record_error(&self, error_type: &str) {
        let mut errors = match self.errors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *errors.entry(error_type.to_string()).or_insert(0) += 1;
    }

    pub fn set_active_cameras(&self, count: usize) {
        self.active_cameras.store(count as i64, Ordering::Relaxed);
    }

    pub fn set_ws_clients(&self, count: u64) {
        self.ws_clients.store(count as i64, Ordering::Relaxed);
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn detections(&self) -> u64 {
        self.detections.load(Ordering::Relaxed)
    }

    pub fn errors(&self, error_type: &str) -> u64 {
        let errors = match self.errors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        errors.get(error_type).copied().unwrap_or(0)
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let mut out = String::new();

        counter(
            &mut out,
            "gateway_frames_processed_total",
            "Total number of frames processed",
            self.frames_processed.load(Ordering::Relaxed),
        );

        let name = "gateway_inference_latency_seconds";
        let _ = writeln!(out, "# HELP {} Time spent waiting for AI inference", name);
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for (bound, bucket) in LATENCY_BUCKETS.iter().zip(&self.latency_buckets) {
            let _ = writeln!(
                out,
                "{}_bucket{{le=\"{}\"}} {}",
                name,
                bound,
                bucket.load(Ordering::Relaxed)
            );
        }
        let count = self.latency_count.load(Ordering::Relaxed);
        let sum = self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        let _ = writeln!(out, "{}_sum {}", name, sum);
        let _ = writeln!(out, "{}_count {}", name, count);

        counter(
            &mut out,
            "gateway_detections_total",
            "Total number of detections received",
            self.detections.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "gateway_violations_total",
            "Total number of safety violations detected",
            self.violations.load(Ordering::Relaxed),
        );

        let _ = writeln!(out, "# HELP gateway_errors_total Total number of errors by type");
        let _ = writeln!(out, "# TYPE gateway_errors_total counter");
        {
            let errors = match self.errors.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for (error_type, value) in errors.iter() {
                let _ = writeln!(
                    out,
                    "gateway_errors_total{{type=\"{}\"}} {}",
                    escape_label(error_type),
                    value
                );
            }
        }

        gauge(
            &mut out,
            "gateway_active_cameras",
            "Number of currently active cameras",
            self.active_cameras.load(Ordering::Relaxed),
        );
        gauge(
            &mut out,
            "gateway_websocket_clients",
            "Number of connected WebSocket clients",
            self.ws_clients.load(Ordering::Relaxed),
        );

        out
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{} {}", name, value);
}

fn gauge(out: &mut String, name: &str, help: &str, value: i64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} gauge", name);
    let _ = writeln!(out, "{} {}", name, value);
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_render_has_all_families() {
        let text = GatewayMetrics::new().render();

        for family in [
            "gateway_frames_processed_total 0",
            "gateway_inference_latency_seconds_count 0",
            "gateway_detections_total 0",
            "gateway_violations_total 0",
            "# TYPE gateway_errors_total counter",
            "gateway_active_cameras 0",
            "gateway_websocket_clients 0",
        ] {
            assert!(text.contains(family), "missing {}", family);
        }
    }

    #[test]
    fn test_latency_buckets_are_cumulative() {
        let metrics = GatewayMetrics::new();
        metrics.record_inference(Duration::from_millis(5));
        metrics.record_inference(Duration::from_millis(30));
        metrics.record_inference(Duration::from_secs(2));

        let text = metrics.render();
        assert!(text.contains("gateway_inference_latency_seconds_bucket{le=\"0.01\"} 1"));
        assert!(text.contains("gateway_inference_latency_seconds_bucket{le=\"0.05\"} 2"));
        assert!(text.contains("gateway_inference_latency_seconds_bucket{le=\"1\"} 2"));
        assert!(text.contains("gateway_inference_latency_seconds_bucket{le=\"+Inf\"} 3"));
        assert!(text.contains("gateway_inference_latency_seconds_count 3"));
        assert_eq!(metrics.frames_processed(), 3);
    }

    #[test]
    fn test_errors_by_type() {
        let metrics = GatewayMetrics::new();
        metrics.record_error("detection");
        metrics.record_error("detection");
        metrics.record_error("no_frame");

        assert_eq!(metrics.errors("detection"), 2);
        assert_eq!(metrics.errors("unknown"), 0);

        let text = metrics.render();
        assert!(text.contains("gateway_errors_total{type=\"detection\"} 2"));
        assert!(text.contains("gateway_errors_total{type=\"no_frame\"} 1"));
    }

    #[test]
    fn test_gauges_overwrite() {
        let metrics = GatewayMetrics::new();
        metrics.set_active_cameras(3);
        metrics.set_active_cameras(1);
        metrics.set_ws_clients(2);

        let text = metrics.render();
        assert!(text.contains("gateway_active_cameras 1\n"));
        assert!(text.contains("gateway_websocket_clients 2\n"));
    }
}
