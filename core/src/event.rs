//! Event and Batch types for the tolva pipeline
//!
//! An [`Event`] is created once at the admission boundary from a validated
//! inbound request and never mutated afterwards. Ownership moves linearly:
//! queue → exactly one worker → that worker's buffer → the sealed [`Batch`].
//!
//! The payload uses `Bytes` so the admission path, the queue, and the dialect
//! all share one allocation.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use ulid::Ulid;

/// A single admitted telemetry event
///
/// Immutable after construction. `verified` is `false` only when the
/// collector runs with an optional signature policy and the signature
/// check failed - under the required policy an unverified request is
/// rejected before an `Event` ever exists.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unique event id, assigned at admission
    pub id: Ulid,
    /// Admission timestamp (UTC)
    pub recorded_at: DateTime<Utc>,
    /// Client identifier supplied by the submitting agent
    pub client_id: String,
    /// Client network address, possibly anonymized by the masking policy
    pub remote_addr: Option<IpAddr>,
    /// Opaque event payload
    pub payload: Bytes,
    /// Whether the request signature validated against the shared secret
    pub verified: bool,
}

impl Event {
    /// Create a new event with a fresh id and the current timestamp
    pub fn new(client_id: impl Into<String>, payload: Bytes) -> Self {
        Self {
            id: Ulid::new(),
            recorded_at: Utc::now(),
            client_id: client_id.into(),
            remote_addr: None,
            payload,
            verified: true,
        }
    }

    /// Attach a (possibly masked) client address
    pub fn with_remote_addr(mut self, addr: Option<IpAddr>) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Mark the event's signature verification outcome
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }
}

/// A sealed, ordered sequence of events
///
/// Assembled by exactly one buffer; insertion order within the batch is
/// preserved. No ordering is guaranteed across batches or across workers.
/// A batch is immutable once sealed: it is either destroyed after a
/// successful flush or handed whole to the failure-reporting path.
#[derive(Debug)]
pub struct Batch {
    events: Vec<Event>,
}

impl Batch {
    /// Seal a sequence of events into an immutable batch
    pub fn seal(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Events in insertion order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events in the batch
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the batch holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
