//! File dialect
//!
//! Appends events to a local file as newline-delimited JSON, one object
//! per event. The whole batch is serialized before anything is written,
//! so a serialization failure never leaves a half-written batch behind.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tolva_core::{Batch, Dialect, DialectError, Event};

/// File dialect - appends newline-delimited JSON
pub struct FileDialect {
    path: PathBuf,
    /// Count of events written
    written_count: AtomicU64,
}

impl FileDialect {
    /// Create a dialect appending to `path`
    ///
    /// The file is opened per send, so an operator can rotate it out from
    /// under a running collector.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            written_count: AtomicU64::new(0),
        }
    }

    /// Total events written
    pub fn written_count(&self) -> u64 {
        self.written_count.load(Ordering::Relaxed)
    }

    fn encode(event: &Event) -> Result<String, DialectError> {
        let line = serde_json::json!({
            "id": event.id.to_string(),
            "recorded_at": event.recorded_at.to_rfc3339(),
            "client_id": event.client_id,
            "remote_addr": event.remote_addr.map(|a| a.to_string()),
            "verified": event.verified,
            "payload": BASE64.encode(&event.payload),
        });
        serde_json::to_string(&line)
            .map_err(|e| DialectError::permanent(format!("event serialization failed: {e}")))
    }
}

#[async_trait]
impl Dialect for FileDialect {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn send(&self, batch: &Batch) -> Result<(), DialectError> {
        let mut buf = String::new();
        for event in batch.events() {
            buf.push_str(&Self::encode(event)?);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DialectError::transient(format!("open {:?}: {e}", self.path)))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| DialectError::transient(format!("write {:?}: {e}", self.path)))?;
        file.flush()
            .await
            .map_err(|e| DialectError::transient(format!("flush {:?}: {e}", self.path)))?;

        self.written_count
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn health(&self) -> bool {
        // Healthy when the target directory is writable
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                tokio::fs::metadata(dir).await.is_ok()
            }
            _ => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn make_batch() -> Batch {
        Batch::seal(vec![
            Event::new("client-1", Bytes::from_static(b"payload-a")),
            Event::new("client-2", Bytes::from_static(b"payload-b")),
        ])
    }

    #[tokio::test]
    async fn appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let dialect = FileDialect::new(&path);

        dialect.send(&make_batch()).await.unwrap();
        dialect.send(&make_batch()).await.unwrap();
        assert_eq!(dialect.written_count(), 4);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["client_id"], "client-1");
        assert_eq!(parsed["verified"], true);
        assert_eq!(
            parsed["payload"],
            BASE64.encode(b"payload-a")
        );
    }

    #[tokio::test]
    async fn unwritable_path_is_transient() {
        let dialect = FileDialect::new("/nonexistent-dir/events.ndjson");
        let err = dialect.send(&make_batch()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn health_reflects_target_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dialect = FileDialect::new(dir.path().join("events.ndjson"));
        assert!(dialect.health().await);

        let dialect = FileDialect::new("/nonexistent-dir/events.ndjson");
        assert!(!dialect.health().await);
    }
}
