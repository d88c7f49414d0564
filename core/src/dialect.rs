//! Dialect trait - the pluggable sink contract
//!
//! A [`Dialect`] is the downstream backend a sealed [`Batch`] is delivered
//! to: a file store, a managed queue, stdout for debugging. The collector
//! never inspects a dialect's behavior - only its success/failure outcome
//! and the transient/permanent classification carried by [`DialectError`].

use crate::error::DialectError;
use crate::event::Batch;
use async_trait::async_trait;

/// Dialect trait - delivers batches to a destination
///
/// Dialects are selected once at startup by name; the collector holds a
/// single `Arc<dyn Dialect>` shared by all workers, so implementations
/// must be `Send + Sync` and internally synchronize any mutable state.
///
/// # Error classification
///
/// `send` should return [`DialectError::Transient`] for failures that may
/// succeed on retry (network errors, throttling) and
/// [`DialectError::Permanent`] for failures that cannot (a rejected batch).
/// The flusher retries transient failures and escalates permanent ones
/// immediately.
#[async_trait]
pub trait Dialect: Send + Sync {
    /// The dialect's registry name, used for selection and logging
    fn name(&self) -> &'static str;

    /// Deliver a batch to the destination
    ///
    /// The batch is sealed; implementations may read it any number of
    /// times (the flusher passes the same batch on every retry attempt).
    async fn send(&self, batch: &Batch) -> Result<(), DialectError>;

    /// Whether the destination is currently reachable and accepting batches
    async fn health(&self) -> bool;

    /// Graceful shutdown: flush any internal state and release resources
    async fn shutdown(&self) -> Result<(), DialectError> {
        Ok(())
    }
}
