//! Collector error types

use thiserror::Error;

/// Errors raised by the collector outside the delivery path
///
/// Delivery failures stay in `DialectError` territory; this type covers
/// startup and infrastructure problems.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Invalid or incomplete configuration
    #[error("config error: {0}")]
    Config(String),

    /// I/O failure (listener bind, file dialect setup)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registry failure
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Convenience alias used throughout the collector
pub type Result<T> = std::result::Result<T, CollectorError>;
