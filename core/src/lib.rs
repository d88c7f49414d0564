//! tolva-core - Core types for the tolva event collector
//!
//! This crate provides the foundational types shared between the tolva
//! collector and dialect (sink) implementations:
//!
//! - [`Event`] - a single admitted telemetry event (immutable after creation)
//! - [`Batch`] - a sealed, ordered group of events produced by one buffer cycle
//! - [`Dialect`] trait - async interface for delivering batches to a backend
//! - [`DialectError`] - transient/permanent failure classification for retries
//!
//! # Why this crate exists
//!
//! Dialect implementations only need the event model and the sink contract,
//! not the collector's queue, workers, or HTTP surface. Keeping these types
//! in a leaf crate lets an out-of-tree dialect depend on `tolva-core` alone.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod dialect;
mod error;
/// Event and batch types
pub mod event;

pub use dialect::Dialect;
pub use error::DialectError;
pub use event::{Batch, Event};
