//! Per-worker event buffer
//!
//! Each worker accumulates dequeued events into its own buffer and seals
//! a batch when the buffer reaches capacity. Buffers are owned by one
//! worker task each, so no synchronization is needed.

use tolva_core::{Batch, Event};

/// Compute a single worker's buffer capacity
///
/// With spreading enabled the configured total is divided evenly across
/// the pool (floor, minimum 1) so the aggregate in-flight volume stays
/// near the configured value regardless of worker count. Without
/// spreading, every worker gets the full amount.
pub fn effective_buffer_size(buffer_size: usize, worker_count: usize, spread: bool) -> usize {
    if spread {
        (buffer_size / worker_count.max(1)).max(1)
    } else {
        buffer_size.max(1)
    }
}

/// Accumulates events until a batch is ready to seal
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Event>,
    capacity: usize,
}

impl EventBuffer {
    /// Create a buffer sealing batches at `capacity` events (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add an event; returns a sealed batch when the buffer fills
    pub fn add(&mut self, event: Event) -> Option<Batch> {
        self.events.push(event);
        if self.events.len() >= self.capacity {
            self.take()
        } else {
            None
        }
    }

    /// Seal whatever is buffered, if anything
    ///
    /// Used by the auto-flush timer and at shutdown; a partial batch is
    /// better than a stranded one.
    pub fn take(&mut self) -> Option<Batch> {
        if self.events.is_empty() {
            return None;
        }
        let events = std::mem::replace(&mut self.events, Vec::with_capacity(self.capacity));
        Some(Batch::seal(events))
    }

    /// Events currently buffered
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
