//! Batch flushing with exponential backoff
//!
//! The flusher owns the delivery contract: a sealed batch is handed to
//! the dialect up to the configured attempt budget, with jittered
//! exponential backoff between attempts. Permanent dialect failures skip
//! the remaining budget. A batch that cannot be delivered is escalated to
//! the [`FailureLog`](crate::failure::FailureLog), never dropped - even
//! when the flush itself is cancelled mid-send at shutdown.

use crate::failure::{FailedBatch, FailureLog};
use crate::metrics::Metrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tolva_core::{Batch, Dialect, DialectError};

/// Xorshift64 behind an atomic; cheap shared randomness for retry jitter
struct Xorshift64 {
    state: AtomicU64,
}

impl Xorshift64 {
    fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x853c49e6748fea9b);
        // Xorshift state must be non-zero
        let seed = if seed == 0 { 0x853c49e6748fea9b } else { seed };
        Self {
            state: AtomicU64::new(seed),
        }
    }

    fn next(&self) -> u64 {
        loop {
            let old = self.state.load(Ordering::Acquire);
            let mut x = old;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            if self
                .state
                .compare_exchange_weak(old, x, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return x;
            }
        }
    }

    /// Random f64 in [0.0, 1.0)
    fn next_f64(&self) -> f64 {
        (self.next() as f64) / (u64::MAX as f64)
    }
}

static JITTER_RNG: std::sync::LazyLock<Xorshift64> = std::sync::LazyLock::new(Xorshift64::new);

fn rand_jitter() -> f64 {
    JITTER_RNG.next_f64()
}

/// Exponential backoff parameters between flush attempts
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Ceiling on the delay between retries
    pub max_delay: Duration,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0), randomizing delay by +/- this fraction
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.25,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry n (1-indexed); retry 0 means the first attempt
    /// and has no delay
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.delay_for_retry_with_jitter(retry, rand_jitter())
    }

    /// Delay with an explicit jitter value (for testing)
    pub fn delay_for_retry_with_jitter(&self, retry: u32, jitter: f64) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        // Computed in microseconds; small initial delays round to zero in
        // whole milliseconds
        let base_us =
            self.initial_delay.as_micros() as f64 * self.multiplier.powi((retry - 1) as i32);
        let base_us = base_us.min(self.max_delay.as_micros() as f64);

        let jitter_range = base_us * self.jitter_factor;
        let jitter_offset = (jitter * 2.0 - 1.0) * jitter_range;
        let final_us = (base_us + jitter_offset).max(1.0);

        Duration::from_micros(final_us as u64)
    }
}

/// Outcome of a flush cycle
#[derive(Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The dialect accepted the batch
    Delivered {
        /// Attempts spent, 1 meaning first-try success
        attempts: u32,
    },
    /// The batch was handed to the failure log
    Escalated,
}

/// Holds the batch during a flush cycle and escalates it if dropped
/// before delivery
///
/// This is what keeps a cancelled flush honest: a worker aborted at
/// shutdown while its batch is inside `Dialect::send` unwinds through
/// this guard, and the batch lands in the failure log instead of
/// vanishing.
struct PendingBatch {
    batch: Option<Batch>,
    failures: Arc<FailureLog>,
    dialect: &'static str,
    /// Attempts started so far, including any in flight
    attempts: u32,
}

impl PendingBatch {
    /// Mark the batch delivered; the guard no longer reports it
    fn disarm(&mut self) {
        self.batch = None;
    }

    fn take(&mut self) -> Option<Batch> {
        self.batch.take()
    }
}

impl Drop for PendingBatch {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            if let Some(m) = Metrics::get() {
                m.batches_escalated.inc();
            }
            self.failures.push(FailedBatch {
                batch,
                error: DialectError::transient("delivery interrupted"),
                dialect: self.dialect,
                failed_at: chrono::Utc::now(),
                attempts: self.attempts,
            });
        }
    }
}

/// Drives batch delivery through a dialect with retries
pub struct Flusher {
    dialect: Arc<dyn Dialect>,
    /// Total attempt budget per batch (minimum 1)
    max_attempts: u32,
    backoff: BackoffPolicy,
    failures: Arc<FailureLog>,
}

impl Flusher {
    /// Build a flusher; `max_attempts` counts every attempt, not just retries
    pub fn new(
        dialect: Arc<dyn Dialect>,
        max_attempts: u32,
        backoff: BackoffPolicy,
        failures: Arc<FailureLog>,
    ) -> Self {
        Self {
            dialect,
            max_attempts: max_attempts.max(1),
            backoff,
            failures,
        }
    }

    /// Deliver a batch, retrying transient failures within the budget
    ///
    /// Permanent failures escalate immediately; exhausting the budget on
    /// transient failures escalates with the last error. Either way the
    /// batch reaches the failure log intact, with the number of attempts
    /// actually started.
    pub async fn flush(&self, batch: Batch) -> FlushOutcome {
        let timer = Metrics::get().map(|m| m.flush_duration_seconds.start_timer());
        let mut pending = PendingBatch {
            batch: Some(batch),
            failures: self.failures.clone(),
            dialect: self.dialect.name(),
            attempts: 0,
        };
        let mut last_error = DialectError::transient("no attempts made");

        for attempt in 1..=self.max_attempts {
            let delay = self.backoff.delay_for_retry(attempt - 1);
            if !delay.is_zero() {
                if let Some(m) = Metrics::get() {
                    m.flush_retries.inc();
                }
                tracing::debug!(
                    dialect = self.dialect.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying flush"
                );
                tokio::time::sleep(delay).await;
            }

            pending.attempts = attempt;
            let sent = match pending.batch.as_ref() {
                Some(batch) => self.dialect.send(batch).await,
                // The batch is only taken on the exit paths below
                None => break,
            };
            match sent {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            dialect = self.dialect.name(),
                            attempt,
                            "flush recovered after retry"
                        );
                    }
                    if let Some(m) = Metrics::get() {
                        m.batches_flushed.inc();
                        if let Some(batch) = pending.batch.as_ref() {
                            m.batch_size.observe(batch.len() as f64);
                        }
                    }
                    pending.disarm();
                    if let Some(timer) = timer {
                        timer.observe_duration();
                    }
                    return FlushOutcome::Delivered { attempts: attempt };
                }
                Err(e) => {
                    tracing::warn!(
                        dialect = self.dialect.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "flush failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = e;
                    if !retryable {
                        break;
                    }
                }
            }
        }

        if let Some(m) = Metrics::get() {
            m.batches_escalated.inc();
        }
        if let Some(timer) = timer {
            timer.observe_duration();
        }
        let attempts = pending.attempts;
        if let Some(batch) = pending.take() {
            self.failures.push(FailedBatch {
                batch,
                error: last_error,
                dialect: self.dialect.name(),
                failed_at: chrono::Utc::now(),
                attempts,
            });
        }
        FlushOutcome::Escalated
    }

    /// The wrapped dialect's registry name
    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    /// Forward a health check to the dialect
    pub async fn health(&self) -> bool {
        self.dialect.health().await
    }

    /// Forward shutdown to the dialect
    pub async fn shutdown(&self) -> Result<(), DialectError> {
        self.dialect.shutdown().await
    }
}
