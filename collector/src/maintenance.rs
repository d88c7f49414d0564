//! Maintenance gate
//!
//! Operators can pause admission without stopping the process: paused,
//! the collector refuses new submissions while workers keep draining the
//! queue and flushing buffers, so nothing already accepted is lost.

use std::sync::atomic::{AtomicBool, Ordering};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Errors from the maintenance toggle
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MaintenanceError {
    /// No maintenance key is configured; the toggle is disabled
    #[error("maintenance toggle is disabled")]
    Disabled,

    /// The supplied key did not match the configured key
    #[error("invalid maintenance key")]
    InvalidKey,
}

/// Pause switch consulted on every admission
///
/// The paused flag is a relaxed atomic: admission only needs to observe
/// the toggle eventually, not synchronize with it.
#[derive(Debug)]
pub struct MaintenanceGate {
    paused: AtomicBool,
    key: String,
}

impl MaintenanceGate {
    /// Build a gate; an empty key disables the toggle entirely
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            paused: AtomicBool::new(false),
            key: key.into(),
        }
    }

    /// Whether admission is currently paused
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Whether a new submission may proceed
    pub fn admit(&self) -> bool {
        !self.is_paused()
    }

    /// Toggle the pause state, authenticated by the configured key
    ///
    /// Key comparison is constant-time; the toggle shares the admission
    /// path's fail-closed posture.
    pub fn set(&self, paused: bool, key: &str) -> Result<(), MaintenanceError> {
        if self.key.is_empty() {
            return Err(MaintenanceError::Disabled);
        }
        let matches: bool = key.as_bytes().ct_eq(self.key.as_bytes()).into();
        if !matches {
            return Err(MaintenanceError::InvalidKey);
        }
        self.paused.store(paused, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_admitting() {
        let gate = MaintenanceGate::new("k");
        assert!(gate.admit());
        assert!(!gate.is_paused());
    }

    #[test]
    fn pause_and_resume_with_valid_key() {
        let gate = MaintenanceGate::new("opskey");
        gate.set(true, "opskey").unwrap();
        assert!(!gate.admit());
        gate.set(false, "opskey").unwrap();
        assert!(gate.admit());
    }

    #[test]
    fn wrong_key_is_rejected_and_state_unchanged() {
        let gate = MaintenanceGate::new("opskey");
        assert_eq!(gate.set(true, "wrong"), Err(MaintenanceError::InvalidKey));
        assert!(gate.admit());
    }

    #[test]
    fn empty_key_disables_toggle() {
        let gate = MaintenanceGate::new("");
        assert_eq!(gate.set(true, ""), Err(MaintenanceError::Disabled));
        assert_eq!(gate.set(true, "anything"), Err(MaintenanceError::Disabled));
        assert!(gate.admit());
    }
}
