//! Stdout dialect for debugging
//!
//! Prints one line per event. Useful for development and for verifying a
//! deployment end to end before pointing it at real storage.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tolva_core::{Batch, Dialect, DialectError};

/// Stdout dialect - prints events for debugging
pub struct StdoutDialect {
    /// Count of events written
    written_count: AtomicU64,
}

impl StdoutDialect {
    /// Create a new StdoutDialect
    pub fn new() -> Self {
        Self {
            written_count: AtomicU64::new(0),
        }
    }

    /// Total events written
    pub fn written_count(&self) -> u64 {
        self.written_count.load(Ordering::Relaxed)
    }
}

impl Default for StdoutDialect {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialect for StdoutDialect {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, batch: &Batch) -> Result<(), DialectError> {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();
        let mut written = 0u64;

        for event in batch.events() {
            let result = writeln!(
                stdout,
                "[{}] {} {} verified={} ({} bytes)",
                event.recorded_at.to_rfc3339(),
                event.id,
                event.client_id,
                event.verified,
                event.payload.len()
            );
            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    // Count what made it out before reporting the failure
                    self.written_count.fetch_add(written, Ordering::Relaxed);
                    return Err(DialectError::transient(format!(
                        "stdout write failed: {e}"
                    )));
                }
            }
        }

        self.written_count.fetch_add(written, Ordering::Relaxed);
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}
