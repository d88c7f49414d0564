//! Bounded event queue between admission and the worker pool
//!
//! Many producers (HTTP handlers) feed many consumers (workers). The
//! channel is bounded so a slow sink exerts backpressure on admission
//! instead of growing memory without limit.

use async_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;
use tolva_core::Event;

/// Enqueue failures surfaced to the admission path
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity (non-blocking enqueue only)
    #[error("event queue is full")]
    Full,

    /// The queue was closed for shutdown
    #[error("event queue is closed")]
    Closed,
}

/// Bounded multi-producer multi-consumer event queue
///
/// Cloning is cheap; each worker holds a clone and competes for events.
/// Once an event is dequeued it belongs to exactly one worker.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl EventQueue {
    /// Create a queue with the given capacity (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Enqueue an event, waiting for a free slot when the queue is full
    pub async fn enqueue(&self, event: Event) -> Result<(), EnqueueError> {
        self.tx.send(event).await.map_err(|_| EnqueueError::Closed)
    }

    /// Enqueue an event without waiting; fails fast when the queue is full
    pub fn try_enqueue(&self, event: Event) -> Result<(), EnqueueError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Dequeue the next event
    ///
    /// Returns `None` only after the queue is closed AND fully drained,
    /// which is the worker's signal to flush and exit.
    pub async fn dequeue(&self) -> Option<Event> {
        self.rx.recv().await.ok()
    }

    /// Dequeue without waiting
    ///
    /// Used by shutdown to drain events no worker will ever pick up.
    pub fn try_dequeue(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Close the queue; producers fail immediately, consumers drain the rest
    pub fn close(&self) {
        self.tx.close();
    }

    /// Events currently waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue holds no events
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        // Constructed with async_channel::bounded, so capacity is always set.
        self.tx.capacity().unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn event(n: usize) -> Event {
        Event::new(format!("client-{n}"), Bytes::new())
    }

    #[tokio::test]
    async fn enqueue_dequeue_preserves_order_single_consumer() {
        let queue = EventQueue::new(8);
        for i in 0..4 {
            queue.enqueue(event(i)).await.unwrap();
        }
        for i in 0..4 {
            let e = queue.dequeue().await.unwrap();
            assert_eq!(e.client_id, format!("client-{i}"));
        }
    }

    #[tokio::test]
    async fn try_enqueue_fails_when_full() {
        let queue = EventQueue::new(2);
        queue.try_enqueue(event(0)).unwrap();
        queue.try_enqueue(event(1)).unwrap();
        assert_eq!(queue.try_enqueue(event(2)), Err(EnqueueError::Full));
        assert_eq!(queue.len(), 2);

        // A dequeue frees a slot
        queue.dequeue().await.unwrap();
        queue.try_enqueue(event(2)).unwrap();
    }

    #[tokio::test]
    async fn close_drains_then_signals_consumers() {
        let queue = EventQueue::new(4);
        queue.enqueue(event(0)).await.unwrap();
        queue.enqueue(event(1)).await.unwrap();
        queue.close();

        assert_eq!(queue.try_enqueue(event(2)), Err(EnqueueError::Closed));

        // Buffered events are still delivered after close
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn capacity_is_clamped_to_one() {
        let queue = EventQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[tokio::test]
    async fn each_event_goes_to_one_consumer() {
        let queue = EventQueue::new(16);
        for i in 0..10 {
            queue.enqueue(event(i)).await.unwrap();
        }
        queue.close();

        let a = queue.clone();
        let b = queue.clone();
        let mut seen = Vec::new();
        let ha = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(e) = a.dequeue().await {
                got.push(e.client_id);
            }
            got
        });
        let hb = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(e) = b.dequeue().await {
                got.push(e.client_id);
            }
            got
        });
        seen.extend(ha.await.unwrap());
        seen.extend(hb.await.unwrap());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }
}
