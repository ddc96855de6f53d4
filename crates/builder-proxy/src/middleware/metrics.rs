//! Proxy and relay counters.
//!
//! Plain atomics, readable at any time; exported as JSON for the shutdown
//! snapshot and, with the `metrics` feature, in Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Which relay operation a [`RequestTimer`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOperation {
    Header,
    Reveal,
}

#[derive(Debug, Default)]
pub struct RelayMetrics {
    // Forwarding
    pub proxied_requests: AtomicU64,
    pub proxy_failures: AtomicU64,
    pub engine_calls: AtomicU64,
    pub payload_ids_observed: AtomicU64,

    // Relay
    pub validators_registered: AtomicU64,
    pub headers_served: AtomicU64,
    pub header_failures: AtomicU64,
    pub payloads_revealed: AtomicU64,
    pub reveal_failures: AtomicU64,

    // Latency of bid construction (fetch, rebuild, sign)
    pub total_header_latency_ms: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a forwarded request
    pub fn record_proxied(&self, success: bool) {
        self.proxied_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.proxy_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a forwarded call in the `engine_` namespace
    pub fn record_engine_call(&self) {
        self.engine_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a non-zero payload id taken from a forkchoice response
    pub fn record_payload_id(&self) {
        self.payload_ids_observed.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the number of known validator registrations
    pub fn set_validators_registered(&self, count: usize) {
        self.validators_registered
            .store(count as u64, Ordering::Relaxed);
    }

    pub fn record_header(&self, success: bool, latency_ms: u64) {
        if success {
            self.headers_served.fetch_add(1, Ordering::Relaxed);
            self.total_header_latency_ms
                .fetch_add(latency_ms, Ordering::Relaxed);
        } else {
            self.header_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reveal(&self, success: bool) {
        if success {
            self.payloads_revealed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reveal_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Average latency of successful header requests in ms
    pub fn average_header_latency_ms(&self) -> f64 {
        let total = self.total_header_latency_ms.load(Ordering::Relaxed);
        let count = self.headers_served.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        let mut push = |name: &str, kind: &str, help: &str, value: String| {
            output.push_str(&format!(
                "# HELP builder_proxy_{name} {help}\n\
                 # TYPE builder_proxy_{name} {kind}\n\
                 builder_proxy_{name} {value}\n"
            ));
        };

        push(
            "proxied_requests_total",
            "counter",
            "Requests forwarded to the execution engine",
            self.proxied_requests.load(Ordering::Relaxed).to_string(),
        );
        push(
            "proxy_failures_total",
            "counter",
            "Forwarded requests that failed upstream",
            self.proxy_failures.load(Ordering::Relaxed).to_string(),
        );
        push(
            "engine_calls_total",
            "counter",
            "Forwarded engine_ namespace calls",
            self.engine_calls.load(Ordering::Relaxed).to_string(),
        );
        push(
            "payload_ids_observed_total",
            "counter",
            "Payload ids observed in forkchoice responses",
            self.payload_ids_observed.load(Ordering::Relaxed).to_string(),
        );
        push(
            "validators_registered",
            "gauge",
            "Known validator registrations",
            self.validators_registered.load(Ordering::Relaxed).to_string(),
        );
        push(
            "headers_served_total",
            "counter",
            "Signed bids returned",
            self.headers_served.load(Ordering::Relaxed).to_string(),
        );
        push(
            "header_failures_total",
            "counter",
            "Header requests that failed",
            self.header_failures.load(Ordering::Relaxed).to_string(),
        );
        push(
            "payloads_revealed_total",
            "counter",
            "Payloads returned for blinded blocks",
            self.payloads_revealed.load(Ordering::Relaxed).to_string(),
        );
        push(
            "reveal_failures_total",
            "counter",
            "Blinded block submissions that failed",
            self.reveal_failures.load(Ordering::Relaxed).to_string(),
        );
        push(
            "average_header_latency_ms",
            "gauge",
            "Average bid construction latency",
            format!("{:.2}", self.average_header_latency_ms()),
        );

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "proxy": {
                "requests": self.proxied_requests.load(Ordering::Relaxed),
                "failures": self.proxy_failures.load(Ordering::Relaxed),
                "engine_calls": self.engine_calls.load(Ordering::Relaxed),
                "payload_ids": self.payload_ids_observed.load(Ordering::Relaxed),
            },
            "relay": {
                "validators": self.validators_registered.load(Ordering::Relaxed),
                "headers": self.headers_served.load(Ordering::Relaxed),
                "header_failures": self.header_failures.load(Ordering::Relaxed),
                "reveals": self.payloads_revealed.load(Ordering::Relaxed),
                "reveal_failures": self.reveal_failures.load(Ordering::Relaxed),
            },
            "latency": {
                "header_average_ms": self.average_header_latency_ms(),
            }
        })
    }
}

/// Request timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<RelayMetrics>,
    operation: RelayOperation,
}

impl RequestTimer {
    pub fn new(metrics: Arc<RelayMetrics>, operation: RelayOperation) -> Self {
        Self {
            start: Instant::now(),
            metrics,
            operation,
        }
    }

    pub fn finish(self, success: bool) {
        match self.operation {
            RelayOperation::Header => {
                let latency_ms = self.start.elapsed().as_millis() as u64;
                self.metrics.record_header(success, latency_ms);
            }
            RelayOperation::Reveal => self.metrics.record_reveal(success),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_counters() {
        let metrics = RelayMetrics::new();

        metrics.record_proxied(true);
        metrics.record_proxied(true);
        metrics.record_proxied(false);
        metrics.record_engine_call();

        assert_eq!(metrics.proxied_requests.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.proxy_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.engine_calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_header_latency() {
        let metrics = RelayMetrics::new();

        metrics.record_header(true, 100);
        metrics.record_header(true, 300);
        metrics.record_header(false, 10_000);

        assert_eq!(metrics.headers_served.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.header_failures.load(Ordering::Relaxed), 1);
        assert!((metrics.average_header_latency_ms() - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_timer_routes_by_operation() {
        let metrics = Arc::new(RelayMetrics::new());

        RequestTimer::new(Arc::clone(&metrics), RelayOperation::Reveal).finish(true);
        RequestTimer::new(Arc::clone(&metrics), RelayOperation::Header).finish(false);

        assert_eq!(metrics.payloads_revealed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.header_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_json_export() {
        let metrics = RelayMetrics::new();
        metrics.set_validators_registered(4);
        metrics.record_payload_id();

        let json = metrics.to_json();
        assert_eq!(json["relay"]["validators"], 4);
        assert_eq!(json["proxy"]["payload_ids"], 1);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_export() {
        let metrics = RelayMetrics::new();
        metrics.record_proxied(false);

        let text = metrics.to_prometheus();
        assert!(text.contains("builder_proxy_proxied_requests_total 1"));
        assert!(text.contains("# TYPE builder_proxy_validators_registered gauge"));
    }
}
