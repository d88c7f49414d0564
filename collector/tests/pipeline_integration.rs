//! End-to-end pipeline tests: admission through dialect delivery

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tolva_collector::admission::{AdmissionError, Collector};
use tolva_collector::dialect::FileDialect;
use tolva_collector::failure::FailureLog;
use tolva_collector::flush::{BackoffPolicy, Flusher};
use tolva_collector::maintenance::MaintenanceGate;
use tolva_collector::masking::MaskingPolicy;
use tolva_collector::queue::EventQueue;
use tolva_collector::signature;
use tolva_collector::worker::{WorkerPool, WorkerPoolConfig};
use tolva_core::{Batch, Dialect, DialectError};

const SECRET: &str = "ultrasafesecret";

/// Records delivered batches as lists of client ids
struct CaptureDialect {
    batches: Mutex<Vec<Vec<String>>>,
}

impl CaptureDialect {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
        })
    }

    fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl Dialect for CaptureDialect {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn send(&self, batch: &Batch) -> Result<(), DialectError> {
        self.batches.lock().push(
            batch
                .events()
                .iter()
                .map(|e| e.client_id.clone())
                .collect(),
        );
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Fails a fixed number of sends before accepting
struct FlakyDialect {
    failures_left: AtomicU32,
    delivered: AtomicU32,
}

impl FlakyDialect {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(failures),
            delivered: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Dialect for FlakyDialect {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn send(&self, batch: &Batch) -> Result<(), DialectError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(DialectError::transient("sink unavailable"));
        }
        self.delivered
            .fetch_add(batch.len() as u32, Ordering::SeqCst);
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

struct Pipeline {
    collector: Collector,
    pool: WorkerPool,
    failures: Arc<FailureLog>,
}

fn pipeline(
    dialect: Arc<dyn Dialect>,
    retry_attempt: u32,
    buffer_size: usize,
    queue_capacity: usize,
    reject_when_full: bool,
) -> Pipeline {
    let queue = EventQueue::new(queue_capacity);
    let failures = Arc::new(FailureLog::new(16));
    let flusher = Arc::new(Flusher::new(
        dialect,
        retry_attempt,
        BackoffPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        },
        failures.clone(),
    ));
    let pool = WorkerPool::start(
        WorkerPoolConfig {
            worker_count: 1,
            buffer_size,
            spread_buffer: false,
            auto_flush: None,
        },
        queue.clone(),
        flusher,
        failures.clone(),
    );
    let collector = Collector::new(
        queue,
        Arc::new(MaintenanceGate::new("opskey")),
        MaskingPolicy::new(false),
        SECRET,
        true,
        reject_when_full,
    );
    Pipeline {
        collector,
        pool,
        failures,
    }
}

async fn submit(collector: &Collector, client: &str) -> Result<(), AdmissionError> {
    let payload = Bytes::from(format!("{{\"client\":\"{client}\"}}"));
    let sig = signature::sign(&payload, SECRET);
    collector.submit(payload, Some(&sig), client, None).await
}

#[tokio::test]
async fn signed_events_flow_through_in_order() {
    let dialect = CaptureDialect::new();
    let p = pipeline(dialect.clone(), 3, 5, 32, false);

    for i in 0..5 {
        submit(&p.collector, &format!("client-{i}")).await.unwrap();
    }
    p.pool.shutdown(Duration::from_secs(5)).await;

    let batches = dialect.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        ["client-0", "client-1", "client-2", "client-3", "client-4"]
    );
    assert!(p.failures.is_empty());
}

#[tokio::test]
async fn unsigned_events_never_reach_the_dialect() {
    let dialect = CaptureDialect::new();
    let p = pipeline(dialect.clone(), 3, 2, 32, false);

    let err = p
        .collector
        .submit(Bytes::from_static(b"payload"), None, "client-x", None)
        .await
        .unwrap_err();
    assert_eq!(err, AdmissionError::InvalidSignature);

    submit(&p.collector, "client-0").await.unwrap();
    submit(&p.collector, "client-1").await.unwrap();
    p.pool.shutdown(Duration::from_secs(5)).await;

    let delivered: Vec<String> = dialect.batches().into_iter().flatten().collect();
    assert_eq!(delivered, ["client-0", "client-1"]);
}

#[tokio::test]
async fn transient_failures_recover_within_budget() {
    // Fails twice; three total attempts are enough
    let dialect = FlakyDialect::new(2);
    let p = pipeline(dialect.clone(), 3, 2, 32, false);

    submit(&p.collector, "client-0").await.unwrap();
    submit(&p.collector, "client-1").await.unwrap();
    p.pool.shutdown(Duration::from_secs(5)).await;

    assert_eq!(dialect.delivered.load(Ordering::SeqCst), 2);
    assert!(p.failures.is_empty());
}

#[tokio::test]
async fn exhausted_budget_escalates_the_whole_batch() {
    // Fails twice; two total attempts are not enough
    let dialect = FlakyDialect::new(2);
    let p = pipeline(dialect.clone(), 2, 2, 32, false);

    submit(&p.collector, "client-0").await.unwrap();
    submit(&p.collector, "client-1").await.unwrap();
    p.pool.shutdown(Duration::from_secs(5)).await;

    assert_eq!(dialect.delivered.load(Ordering::SeqCst), 0);
    assert_eq!(p.failures.total_captured(), 1);
    let escalated = p.failures.drain();
    assert_eq!(escalated[0].batch.len(), 2);
    assert_eq!(escalated[0].attempts, 2);
}

/// Never completes a send; simulates a hung sink
struct StuckDialect;

#[async_trait]
impl Dialect for StuckDialect {
    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn send(&self, _: &Batch) -> Result<(), DialectError> {
        std::future::pending().await
    }

    async fn health(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn queue_full_surfaces_at_admission() {
    // Buffer of 1 makes the worker flush immediately, where it hangs on
    // the stuck sink; the queue then backs up and admission rejects
    let p = pipeline(Arc::new(StuckDialect), 1, 1, 2, true);

    let mut accepted = 0;
    let mut rejected = 0;
    for i in 0..20 {
        match submit(&p.collector, &format!("client-{i}")).await {
            Ok(()) => accepted += 1,
            Err(AdmissionError::QueueFull) => rejected += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
        tokio::task::yield_now().await;
    }
    assert!(accepted >= 2);
    assert!(rejected > 0);

    // Workers cannot drain; the grace period elapses and every accepted
    // event is escalated instead of discarded, whether it was hung
    // inside the sink or still sitting in the queue
    p.pool.shutdown(Duration::from_millis(100)).await;
    assert!(p.failures.total_captured() >= 1);
    let escalated = p.failures.drain();
    let reported: usize = escalated.iter().map(|f| f.batch.len()).sum();
    assert_eq!(reported, accepted);
}

#[tokio::test]
async fn maintenance_pause_preserves_inflight_events() {
    let dialect = CaptureDialect::new();
    let p = pipeline(dialect.clone(), 3, 100, 32, false);

    submit(&p.collector, "client-0").await.unwrap();
    submit(&p.collector, "client-1").await.unwrap();

    p.collector.gate().set(true, "opskey").unwrap();
    let err = submit(&p.collector, "client-2").await.unwrap_err();
    assert_eq!(err, AdmissionError::Maintenance);

    p.collector.gate().set(false, "opskey").unwrap();
    submit(&p.collector, "client-3").await.unwrap();

    p.pool.shutdown(Duration::from_secs(5)).await;
    let delivered: Vec<String> = dialect.batches().into_iter().flatten().collect();
    assert_eq!(delivered, ["client-0", "client-1", "client-3"]);
}

#[tokio::test]
async fn file_dialect_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.ndjson");
    let dialect = Arc::new(FileDialect::new(&path));
    let p = pipeline(dialect, 3, 3, 32, false);

    for i in 0..3 {
        submit(&p.collector, &format!("client-{i}")).await.unwrap();
    }
    p.pool.shutdown(Duration::from_secs(5)).await;

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["client_id"], format!("client-{i}"));
        assert_eq!(parsed["verified"], true);
    }
    assert!(p.failures.is_empty());
}
