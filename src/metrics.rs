//! Prometheus metrics for relayed calls.
//!
//! Metrics live in a registry owned by [`RelayMetrics`] rather than the
//! process-global default, so tests can create as many as they like.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `rpc_relay_calls_total` | counter | `method`, `outcome` |
//! | `rpc_relay_call_duration_seconds` | histogram | `method` |
//!
//! `outcome` is `success` or the error type name. Calls to unregistered
//! methods are counted under `method="unknown"` so arbitrary client input
//! cannot blow up label cardinality.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Label used for calls whose method is not registered.
pub const UNKNOWN_METHOD_LABEL: &str = "unknown";

/// Outcome label for successful calls.
pub const SUCCESS_OUTCOME: &str = "success";

/// Call counters and latency histogram.
#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    calls_total: IntCounterVec,
    call_duration: HistogramVec,
}

impl RelayMetrics {
    /// Create and register all metrics.
    ///
    /// # Errors
    ///
    /// Returns `prometheus::Error` if a metric definition is invalid.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let calls_total = IntCounterVec::new(
            Opts::new("rpc_relay_calls_total", "Calls processed by the relay"),
            &["method", "outcome"],
        )?;
        let call_duration = HistogramVec::new(
            HistogramOpts::new(
                "rpc_relay_call_duration_seconds",
                "End-to-end call latency including the peer round trip",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["method"],
        )?;

        registry.register(Box::new(calls_total.clone()))?;
        registry.register(Box::new(call_duration.clone()))?;

        Ok(Self {
            registry,
            calls_total,
            call_duration,
        })
    }

    /// Record one finished call.
    pub fn record(&self, method: &str, outcome: &str, elapsed: Duration) {
        self.calls_total
            .with_label_values(&[method, outcome])
            .inc();
        self.call_duration
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    /// Number of calls recorded for a method/outcome pair.
    pub fn calls(&self, method: &str, outcome: &str) -> u64 {
        self.calls_total
            .with_label_values(&[method, outcome])
            .get()
    }

    /// Render all metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns `prometheus::Error` if encoding fails.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
