//! Collector binary
//!
//! Usage: `tolva [config.toml]`

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;
use tolva_collector::admission::Collector;
use tolva_collector::config::Config;
use tolva_collector::error::Result;
use tolva_collector::failure::FailureLog;
use tolva_collector::flush::{BackoffPolicy, Flusher};
use tolva_collector::maintenance::MaintenanceGate;
use tolva_collector::masking::MaskingPolicy;
use tolva_collector::metrics::Metrics;
use tolva_collector::queue::EventQueue;
use tolva_collector::server::{self, ServerState};
use tolva_collector::worker::{WorkerPool, WorkerPoolConfig};
use tolva_collector::dialect;
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for workers to drain before escalating
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Escalated batches retained for operator inspection
const FAILURE_LOG_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tolva.toml".to_string());
    let mut config = Config::from_file(&config_path)?;
    config.validate()?;
    config.update_auto_flush_interval_to_seconds();

    Metrics::init()?;

    let dialect = dialect::build(&config.dialect_config()?)?;
    tracing::info!(dialect = dialect.name(), "dialect ready");

    let queue = EventQueue::new(config.max_queue_size());
    let failures = Arc::new(FailureLog::new(FAILURE_LOG_CAPACITY));
    let flusher = Arc::new(Flusher::new(
        dialect,
        config.retry_attempt(),
        BackoffPolicy::default(),
        failures.clone(),
    ));

    let pool = WorkerPool::start(
        WorkerPoolConfig {
            worker_count: config.max_worker_size(),
            buffer_size: config.buffer_size(),
            spread_buffer: config.is_spread_buffer(),
            auto_flush: match config.auto_flush_interval {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        },
        queue.clone(),
        flusher.clone(),
        failures.clone(),
    );

    let collector = Arc::new(Collector::new(
        queue,
        Arc::new(MaintenanceGate::new(config.maintenance_key.clone())),
        MaskingPolicy::new(config.is_masked_ip()),
        config.shared_secret.clone(),
        config.is_signature_required(),
        config.reject_when_full,
    ));

    let state = ServerState {
        collector,
        flusher,
    };
    server::serve(&config.address(), state, shutdown_signal()).await?;

    tracing::info!("server stopped, draining pipeline");
    pool.shutdown(SHUTDOWN_GRACE).await;

    let escalated = failures.total_captured();
    if escalated > 0 {
        tracing::warn!(escalated, "batches left in the failure log");
    }
    tracing::info!("collector stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the process can only be killed; log and
        // keep serving rather than exiting on our own.
        tracing::error!(error = %e, "failed to install shutdown signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
