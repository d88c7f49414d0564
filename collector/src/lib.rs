//! tolva-collector - signed telemetry event collector
//!
//! Receives HMAC-signed events over HTTP, queues them, buffers per
//! worker, and delivers sealed batches to a configured dialect with
//! retries. Batches that exhaust their delivery budget land in an
//! in-memory failure log instead of being dropped.
//!
//! Pipeline shape:
//!
//! ```text
//! HTTP -> admission (signature, maintenance, masking) -> queue
//!      -> workers (buffer, seal) -> flusher (retry) -> dialect
//!                                        \-> failure log
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod admission;
pub mod buffer;
pub mod config;
pub mod dialect;
pub mod error;
pub mod failure;
pub mod flush;
pub mod maintenance;
pub mod masking;
pub mod metrics;
pub mod queue;
pub mod server;
pub mod signature;
pub mod worker;

pub use admission::{AdmissionError, Collector};
pub use config::Config;
pub use error::{CollectorError, Result};
pub use flush::{BackoffPolicy, FlushOutcome, Flusher};
pub use worker::{WorkerPool, WorkerPoolConfig};
