//! Admission pipeline
//!
//! Every inbound submission passes the same gauntlet in a fixed order:
//! signature verification, the maintenance gate, address masking, then
//! the queue. The order matters - an unsigned request is rejected before
//! it can even observe whether the collector is paused.

use crate::maintenance::MaintenanceGate;
use crate::masking::MaskingPolicy;
use crate::metrics::Metrics;
use crate::queue::{EnqueueError, EventQueue};
use crate::signature;
use bytes::Bytes;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tolva_core::Event;

/// Rejections surfaced to the HTTP layer
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdmissionError {
    /// Missing or invalid signature under the required policy
    #[error("invalid request signature")]
    InvalidSignature,

    /// The collector is paused for maintenance
    #[error("collector is paused for maintenance")]
    Maintenance,

    /// The queue is at capacity and the collector is configured to reject
    #[error("event queue is full")]
    QueueFull,

    /// The collector is shutting down
    #[error("collector is shutting down")]
    Closed,
}

/// The collector front door: validates and enqueues submissions
pub struct Collector {
    queue: EventQueue,
    gate: Arc<MaintenanceGate>,
    masking: MaskingPolicy,
    shared_secret: String,
    signature_required: bool,
    reject_when_full: bool,
}

impl Collector {
    /// Wire up the admission pipeline
    pub fn new(
        queue: EventQueue,
        gate: Arc<MaintenanceGate>,
        masking: MaskingPolicy,
        shared_secret: impl Into<String>,
        signature_required: bool,
        reject_when_full: bool,
    ) -> Self {
        Self {
            queue,
            gate,
            masking,
            shared_secret: shared_secret.into(),
            signature_required,
            reject_when_full,
        }
    }

    /// Admit one submission into the queue
    ///
    /// Under the optional signature policy an unverifiable submission is
    /// still admitted, flagged unverified on the event. With
    /// `reject_when_full` unset, a full queue blocks the caller instead
    /// of failing - backpressure reaches the client as latency.
    pub async fn submit(
        &self,
        payload: Bytes,
        provided_signature: Option<&str>,
        client_id: &str,
        remote_addr: Option<IpAddr>,
    ) -> Result<(), AdmissionError> {
        let verified = match provided_signature {
            Some(sig) => signature::verify(&payload, sig, &self.shared_secret),
            None => false,
        };
        if self.signature_required && !verified {
            if let Some(m) = Metrics::get() {
                m.record_rejected("invalid_signature");
            }
            tracing::debug!(client_id, "submission rejected: invalid signature");
            return Err(AdmissionError::InvalidSignature);
        }

        if !self.gate.admit() {
            if let Some(m) = Metrics::get() {
                m.record_rejected("maintenance");
            }
            return Err(AdmissionError::Maintenance);
        }

        let event = Event::new(client_id, payload)
            .with_remote_addr(self.masking.apply(remote_addr))
            .with_verified(verified);

        let result = if self.reject_when_full {
            self.queue.try_enqueue(event)
        } else {
            self.queue.enqueue(event).await
        };
        match result {
            Ok(()) => {
                if let Some(m) = Metrics::get() {
                    m.events_received.inc();
                    m.queue_depth.set(self.queue.len() as f64);
                }
                Ok(())
            }
            Err(EnqueueError::Full) => {
                if let Some(m) = Metrics::get() {
                    m.record_rejected("queue_full");
                }
                tracing::warn!(client_id, "submission rejected: queue full");
                Err(AdmissionError::QueueFull)
            }
            Err(EnqueueError::Closed) => Err(AdmissionError::Closed),
        }
    }

    /// The maintenance gate shared with the HTTP layer
    pub fn gate(&self) -> &MaintenanceGate {
        &self.gate
    }

    /// The queue shared with the worker pool
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }
}
