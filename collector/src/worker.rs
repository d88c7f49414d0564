//! Worker pool: queue consumers that buffer and flush
//!
//! Each worker owns a private buffer and competes with its siblings for
//! queued events. A worker awaits its own flushes, so batches from one
//! buffer reach the dialect in the order they were sealed; there is no
//! ordering across workers.

use crate::buffer::{EventBuffer, effective_buffer_size};
use crate::failure::{FailedBatch, FailureLog};
use crate::flush::Flusher;
use crate::metrics::Metrics;
use crate::queue::EventQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tolva_core::{Batch, DialectError};

/// Sizing and timing for the pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker tasks
    pub worker_count: usize,
    /// Configured buffer total, before spreading
    pub buffer_size: usize,
    /// Divide the buffer total across workers
    pub spread_buffer: bool,
    /// Flush a non-empty buffer this long after its first event; `None`
    /// disables the timer
    pub auto_flush: Option<Duration>,
}

/// Running pool of worker tasks
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    queue: EventQueue,
    flusher: Arc<Flusher>,
    failures: Arc<FailureLog>,
}

impl WorkerPool {
    /// Spawn the workers
    pub fn start(
        config: WorkerPoolConfig,
        queue: EventQueue,
        flusher: Arc<Flusher>,
        failures: Arc<FailureLog>,
    ) -> Self {
        let worker_count = config.worker_count.max(1);
        let capacity =
            effective_buffer_size(config.buffer_size, worker_count, config.spread_buffer);
        tracing::info!(
            workers = worker_count,
            buffer_capacity = capacity,
            auto_flush_secs = config.auto_flush.map(|d| d.as_secs()),
            "starting worker pool"
        );

        let handles = (0..worker_count)
            .map(|id| {
                let queue = queue.clone();
                let flusher = flusher.clone();
                let failures = failures.clone();
                let auto_flush = config.auto_flush;
                tokio::spawn(async move {
                    run_worker(id, queue, capacity, auto_flush, flusher, failures).await;
                })
            })
            .collect();

        Self {
            handles,
            queue,
            flusher,
            failures,
        }
    }

    /// Graceful shutdown: close the queue, drain, flush, then stop
    ///
    /// Workers see the close once the queue is drained, flush their
    /// partial buffers, and exit. If that takes longer than `grace`, the
    /// workers are cancelled; their buffer and in-flight-batch guards
    /// escalate whatever they were holding, and anything still queued is
    /// escalated here. Nothing is discarded silently.
    pub async fn shutdown(mut self, grace: Duration) {
        self.queue.close();
        tracing::info!(
            queued = self.queue.len(),
            grace_secs = grace.as_secs(),
            "draining worker pool"
        );

        let joined =
            tokio::time::timeout(grace, futures::future::join_all(self.handles.iter_mut())).await;

        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "worker task did not exit cleanly");
                    }
                }
            }
            Err(_) => {
                tracing::error!("shutdown grace period elapsed with workers still running");
                // Await each cancelled task so its guards run before we
                // report the stranded queue
                for handle in self.handles.iter_mut() {
                    handle.abort();
                    let _ = handle.await;
                }
                let mut stranded = Vec::new();
                while let Some(event) = self.queue.try_dequeue() {
                    stranded.push(event);
                }
                if !stranded.is_empty() {
                    self.failures.push(FailedBatch {
                        batch: Batch::seal(stranded),
                        error: DialectError::transient("shutdown grace period elapsed"),
                        dialect: self.flusher.dialect_name(),
                        failed_at: chrono::Utc::now(),
                        attempts: 0,
                    });
                }
            }
        }

        if let Err(e) = self.flusher.shutdown().await {
            tracing::warn!(error = %e, "dialect shutdown failed");
        }
    }
}

/// Escalates a worker's buffered events if the worker is torn down
/// before flushing them
struct GuardedBuffer {
    buffer: EventBuffer,
    failures: Arc<FailureLog>,
    dialect: &'static str,
}

impl Drop for GuardedBuffer {
    fn drop(&mut self) {
        if let Some(batch) = self.buffer.take() {
            self.failures.push(FailedBatch {
                batch,
                error: DialectError::transient("worker stopped before flush"),
                dialect: self.dialect,
                failed_at: chrono::Utc::now(),
                attempts: 0,
            });
        }
    }
}

async fn run_worker(
    id: usize,
    queue: EventQueue,
    capacity: usize,
    auto_flush: Option<Duration>,
    flusher: Arc<Flusher>,
    failures: Arc<FailureLog>,
) {
    let mut guarded = GuardedBuffer {
        buffer: EventBuffer::new(capacity),
        failures,
        dialect: flusher.dialect_name(),
    };
    // Set when the buffer holds events and a timer is configured
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            Some(when) => {
                tokio::select! {
                    event = queue.dequeue() => event,
                    _ = tokio::time::sleep_until(when) => {
                        if let Some(batch) = guarded.buffer.take() {
                            tracing::debug!(worker = id, events = batch.len(), "timer flush");
                            flusher.flush(batch).await;
                        }
                        deadline = None;
                        continue;
                    }
                }
            }
            None => queue.dequeue().await,
        };

        match next {
            Some(event) => {
                if let Some(m) = Metrics::get() {
                    m.queue_depth.set(queue.len() as f64);
                }
                let first_in_buffer = guarded.buffer.is_empty();
                if let Some(batch) = guarded.buffer.add(event) {
                    deadline = None;
                    flusher.flush(batch).await;
                } else if first_in_buffer {
                    deadline = auto_flush.map(|interval| Instant::now() + interval);
                }
            }
            // Queue closed and drained: flush the partial buffer and exit
            None => break,
        }
    }

    if let Some(batch) = guarded.buffer.take() {
        tracing::debug!(worker = id, events = batch.len(), "shutdown flush");
        flusher.flush(batch).await;
    }
    tracing::debug!(worker = id, "worker stopped");
}
