//! Configuration snapshot for the collector
//!
//! The config is loaded once at startup from a TOML file and treated as
//! immutable afterwards. Defaults are applied inside the getter methods,
//! not at load time, so a zero/absent value always means "use the
//! documented default". Precedence for the env-overridable settings is:
//! environment variable > file value > built-in default.

use crate::error::{CollectorError, Result};
use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::path::Path;

/// Environment override for the worker pool size
pub const ENV_MAX_WORKER_SIZE: &str = "TOLVA_MAX_WORKER_SIZE";
/// Environment override for the queue capacity
pub const ENV_MAX_QUEUE_SIZE: &str = "TOLVA_MAX_QUEUE_SIZE";
/// Environment override for the listen host
pub const ENV_HOST: &str = "TOLVA_HOST";
/// Environment override for the listen port
pub const ENV_PORT: &str = "TOLVA_PORT";

/// Input values at or above this are read as minutes and converted to
/// seconds by [`Config::update_auto_flush_interval_to_seconds`].
const MINUTE_HEURISTIC_THRESHOLD: u64 = 60;

/// Resolved collector configuration
///
/// All sizing fields use zero to mean "unset"; call the getter methods
/// rather than reading fields when a default must apply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared secret for event signature verification (required)
    pub shared_secret: String,
    /// Dialect name, matched case-insensitively against the registry (required)
    pub dialect: String,
    /// Worker pool size; 0 = available parallelism + 1
    pub max_worker_size: usize,
    /// Queue capacity; 0 = worker size x 20
    pub max_queue_size: usize,
    /// Buffer target; 0 = worker size squared x 200
    pub buffer_size: usize,
    /// Divide `buffer_size` across workers instead of giving each the full amount
    pub spread_buffer_size: bool,
    /// Total flush attempts per batch; 0 = 3
    pub retry_attempt: u32,
    /// Forced-flush interval; 0 disables the timer. Normalized to seconds
    /// by [`Config::update_auto_flush_interval_to_seconds`].
    pub auto_flush_interval: u64,
    /// Signature policy: anything other than exactly `"optional"` means required
    pub signature: String,
    /// Anonymize client addresses before admission
    pub masked_ip: bool,
    /// Key for the maintenance toggle; empty disables the feature
    pub maintenance_key: String,
    /// Reject submissions with a queue-full error instead of blocking the
    /// producer when the queue is at capacity
    pub reject_when_full: bool,
    /// Listen host; empty = "localhost"
    pub host: String,
    /// Listen port; empty = "8080"
    pub port: String,
    /// Settings for the `file` dialect
    pub file: Option<FileDialectConfig>,
}

/// Configuration for the file dialect
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileDialectConfig {
    /// Path the dialect appends newline-delimited JSON batches to
    pub path: String,
}

/// Dialect selection resolved from the registry
#[derive(Debug, Clone)]
pub enum DialectConfig {
    /// Line-per-event debug sink
    Stdout,
    /// Newline-delimited JSON file sink
    File(FileDialectConfig),
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| CollectorError::Config(format!("failed to load config: {e}")))
    }

    /// Whether the snapshot carries the settings the pipeline cannot start without
    pub fn is_valid(&self) -> bool {
        !self.shared_secret.is_empty() && !self.dialect.is_empty()
    }

    /// Full startup validation: required fields present and the dialect
    /// name resolves against the registry
    pub fn validate(&self) -> Result<()> {
        if self.shared_secret.is_empty() {
            return Err(CollectorError::Config(
                "`shared_secret` must be set".into(),
            ));
        }
        if self.dialect.is_empty() {
            return Err(CollectorError::Config("`dialect` must be set".into()));
        }
        self.dialect_config().map(|_| ())
    }

    /// Resolve the configured dialect name against the registry
    ///
    /// Lookup is case-insensitive; an unknown name is a configuration
    /// error raised before any worker starts.
    pub fn dialect_config(&self) -> Result<DialectConfig> {
        match self.dialect.to_ascii_lowercase().as_str() {
            "stdout" => Ok(DialectConfig::Stdout),
            "file" => Ok(DialectConfig::File(self.file.clone().unwrap_or_default())),
            other => Err(CollectorError::Config(format!(
                "unknown dialect `{other}` (registered: stdout, file)"
            ))),
        }
    }

    /// Worker pool size
    ///
    /// Env override wins over an explicit file value; the default is
    /// available parallelism + 1.
    pub fn max_worker_size(&self) -> usize {
        if let Some(v) = env_usize(ENV_MAX_WORKER_SIZE) {
            return v;
        }
        if self.max_worker_size > 0 {
            return self.max_worker_size;
        }
        available_parallelism() + 1
    }

    /// Queue capacity; defaults to 20 slots per worker
    pub fn max_queue_size(&self) -> usize {
        if let Some(v) = env_usize(ENV_MAX_QUEUE_SIZE) {
            return v;
        }
        if self.max_queue_size > 0 {
            return self.max_queue_size;
        }
        self.max_worker_size() * 20
    }

    /// Buffer target; defaults to worker size squared x 200
    pub fn buffer_size(&self) -> usize {
        if self.buffer_size > 0 {
            return self.buffer_size;
        }
        let workers = self.max_worker_size();
        workers * workers * 20 * 10
    }

    /// Whether `buffer_size` is spread across the pool (see the buffer module)
    pub fn is_spread_buffer(&self) -> bool {
        self.spread_buffer_size
    }

    /// Total flush attempts per batch; defaults to 3
    pub fn retry_attempt(&self) -> u32 {
        if self.retry_attempt > 0 {
            self.retry_attempt
        } else {
            3
        }
    }

    /// Signature policy: required unless the config says exactly `"optional"`
    ///
    /// An unrecognized value falls back to required - failing closed is the
    /// safe reading of a typo in a security setting.
    pub fn is_signature_required(&self) -> bool {
        self.signature != "optional"
    }

    /// Whether client addresses are anonymized before admission
    pub fn is_masked_ip(&self) -> bool {
        self.masked_ip
    }

    /// Normalize `auto_flush_interval` to seconds
    ///
    /// Values at or above the minute-heuristic threshold (60) are read as
    /// minutes and multiplied by 60; smaller values are already seconds.
    pub fn update_auto_flush_interval_to_seconds(&mut self) {
        if self.auto_flush_interval >= MINUTE_HEURISTIC_THRESHOLD {
            self.auto_flush_interval *= 60;
        }
    }

    /// Listen host; env override > file value > `"localhost"`
    pub fn host(&self) -> String {
        if let Some(v) = env_string(ENV_HOST) {
            return v;
        }
        if !self.host.is_empty() {
            return self.host.clone();
        }
        "localhost".to_string()
    }

    /// Listen port; env override > file value > `"8080"`
    pub fn port(&self) -> String {
        if let Some(v) = env_string(ENV_PORT) {
            return v;
        }
        if !self.port.is_empty() {
            return self.port.clone();
        }
        "8080".to_string()
    }

    /// Listen address composed as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }
}
