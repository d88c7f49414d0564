//! Failure log for batches that exhausted delivery
//!
//! A batch is never silently discarded: when the flusher gives up, the
//! whole batch lands here with the error that killed it, where operators
//! can inspect or drain it for replay. The log is bounded; when full, the
//! oldest entry is evicted and counted so loss is at least visible.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tolva_core::{Batch, DialectError};

/// A batch the flusher gave up on, with delivery context
#[derive(Debug)]
pub struct FailedBatch {
    /// The undelivered batch, intact
    pub batch: Batch,
    /// The final error before escalation
    pub error: DialectError,
    /// Name of the dialect that refused it
    pub dialect: &'static str,
    /// When the flusher escalated
    pub failed_at: chrono::DateTime<chrono::Utc>,
    /// Delivery attempts started before giving up; 0 means the batch
    /// never reached the dialect
    pub attempts: u32,
}

/// Bounded in-memory log of escalated batches
#[derive(Debug)]
pub struct FailureLog {
    entries: Mutex<VecDeque<FailedBatch>>,
    capacity: usize,
    total_captured: AtomicU64,
    total_dropped: AtomicU64,
}

impl FailureLog {
    /// Create a log retaining at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            total_captured: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    /// Record an escalated batch, evicting the oldest entry when full
    pub fn push(&self, failed: FailedBatch) {
        tracing::error!(
            dialect = failed.dialect,
            events = failed.batch.len(),
            attempts = failed.attempts,
            error = %failed.error,
            "batch escalated to failure log"
        );
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }
        entries.push_back(failed);
        self.total_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove and return all retained entries, oldest first
    pub fn drain(&self) -> Vec<FailedBatch> {
        self.entries.lock().drain(..).collect()
    }

    /// Entries currently retained
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Batches escalated over the log's lifetime
    pub fn total_captured(&self) -> u64 {
        self.total_captured.load(Ordering::Relaxed)
    }

    /// Entries evicted to make room over the log's lifetime
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tolva_core::Event;

    fn failed(n: usize) -> FailedBatch {
        FailedBatch {
            batch: Batch::seal(vec![Event::new(format!("client-{n}"), Bytes::new())]),
            error: DialectError::transient("connection refused"),
            dialect: "stdout",
            failed_at: chrono::Utc::now(),
            attempts: 3,
        }
    }

    #[test]
    fn push_and_drain_oldest_first() {
        let log = FailureLog::new(10);
        log.push(failed(0));
        log.push(failed(1));
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_captured(), 2);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].batch.events()[0].client_id, "client-0");
        assert!(log.is_empty());
        // Drain does not reset lifetime counters
        assert_eq!(log.total_captured(), 2);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let log = FailureLog::new(2);
        log.push(failed(0));
        log.push(failed(1));
        log.push(failed(2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_dropped(), 1);

        let drained = log.drain();
        assert_eq!(drained[0].batch.events()[0].client_id, "client-1");
        assert_eq!(drained[1].batch.events()[0].client_id, "client-2");
    }

    #[test]
    fn capacity_clamped_to_one() {
        let log = FailureLog::new(0);
        log.push(failed(0));
        log.push(failed(1));
        assert_eq!(log.len(), 1);
    }
}
