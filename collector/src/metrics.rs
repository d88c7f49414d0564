//! Prometheus metrics for the collector

use crate::error::Result;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All collector metrics
pub struct Metrics {
    /// Events admitted into the queue
    pub events_received: Counter,

    /// Events rejected at the admission boundary (by reason)
    pub events_rejected: CounterVec,

    /// Batches delivered to the dialect
    pub batches_flushed: Counter,

    /// Flush attempts beyond the first, across all batches
    pub flush_retries: Counter,

    /// Batches escalated to the failure log
    pub batches_escalated: Counter,

    /// Events per delivered batch
    pub batch_size: Histogram,

    /// Events currently waiting in the queue
    pub queue_depth: Gauge,

    /// Time spent in a flush cycle, retries included
    pub flush_duration_seconds: Histogram,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            events_received: register_counter!(
                "tolva_events_received_total",
                "Total events admitted into the queue"
            )?,

            events_rejected: register_counter_vec!(
                "tolva_events_rejected_total",
                "Total events rejected at admission",
                &["reason"]
            )?,

            batches_flushed: register_counter!(
                "tolva_batches_flushed_total",
                "Total batches delivered to the dialect"
            )?,

            flush_retries: register_counter!(
                "tolva_flush_retries_total",
                "Total flush attempts beyond the first"
            )?,

            batches_escalated: register_counter!(
                "tolva_batches_escalated_total",
                "Total batches escalated to the failure log"
            )?,

            batch_size: register_histogram!(
                "tolva_batch_size",
                "Events per delivered batch",
                vec![1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]
            )?,

            queue_depth: register_gauge!(
                "tolva_queue_depth",
                "Events currently waiting in the queue"
            )?,

            flush_duration_seconds: register_histogram!(
                "tolva_flush_duration_seconds",
                "Time spent flushing a batch, retries included",
                vec![0.0001, 0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
            )?,
        };

        // set() only succeeds once; a racing init just reads the winner
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| crate::error::CollectorError::Config("metrics init failed".into()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record an admission rejection
    pub fn record_rejected(&self, reason: &str) {
        self.events_rejected.with_label_values(&[reason]).inc();
    }
}

/// Gather all metrics and encode as Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}
