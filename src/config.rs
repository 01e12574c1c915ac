//! Configuration for a queue instance.
//!
//! Mirrors the teacher's layered `Config` (defaults -> file -> env
//! overrides -> validation), trimmed to the fields this crate actually
//! uses: instance identity, data directory, listen address, cluster
//! bootstrap, and the tuning knobs the spec names explicitly.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default chunk rollover threshold (20 MiB).
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 20 * 1024 * 1024;
/// Default read block size (8 MiB).
pub const DEFAULT_READ_BLOCK_SIZE: usize = 8 * 1024 * 1024;
/// Default replication download batch size (4 MiB).
pub const DEFAULT_REPLICATION_BATCH_SIZE: usize = 4 * 1024 * 1024;

/// Top-level configuration for one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// This instance's name; embedded in every chunk file it owns.
    pub instance_name: String,

    /// Cluster name; scopes all coordinator keys.
    pub cluster: String,

    /// Root directory holding one subdirectory per category.
    pub dirname: PathBuf,

    /// Address this instance's HTTP server binds to and advertises to
    /// peers as its read endpoint.
    pub listen: SocketAddr,

    /// Bootstrap addresses of coordinator peers (comma-separated on the
    /// CLI as `--etcd`; kept under that name for continuity with the
    /// wire/CLI contract even though the coordinator here is in-process).
    pub etcd_endpoints: Vec<String>,

    /// Storage and replication tuning.
    pub tuning: TuningConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Tuning knobs named explicitly by the specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Chunk rollover threshold in bytes.
    pub max_chunk_size: u64,

    /// Block size used by `ChunkStore::read`'s internal read loop.
    pub read_block_size: usize,

    /// Batch size the replicator requests per HTTP read.
    pub replication_batch_size: usize,

    /// Sleep between poll attempts while waiting on an incomplete remote
    /// chunk to grow.
    pub poll_interval: Duration,

    /// Sleep before retrying after a transport/stat error.
    pub retry_timeout: Duration,

    /// Per-request HTTP client timeout.
    pub http_timeout: Duration,

    /// Default KV operation timeout.
    pub kv_timeout: Duration,

    /// Bound on the chunk store's cached read file-descriptors.
    pub fd_cache_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
            replication_batch_size: DEFAULT_REPLICATION_BATCH_SIZE,
            poll_interval: Duration::from_millis(50),
            retry_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(1),
            kv_timeout: Duration::from_secs(10),
            fd_cache_capacity: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_name: String::new(),
            cluster: "default".to_string(),
            dirname: PathBuf::from("./data"),
            listen: "0.0.0.0:8080".parse().unwrap(),
            etcd_endpoints: Vec::new(),
            tuning: TuningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load a config from a TOML file, falling back to defaults for any
    /// field the file does not mention on top of CLI-provided fields.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("failed to read config file {:?}: {e}", path.as_ref()))
        })?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("failed to parse config file: {e}")))
    }

    /// Apply `CHUKCHA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(v) = env::var("CHUKCHA_INSTANCE_NAME") {
            self.instance_name = v;
        }
        if let Ok(v) = env::var("CHUKCHA_CLUSTER") {
            self.cluster = v;
        }
        if let Ok(v) = env::var("CHUKCHA_DIRNAME") {
            self.dirname = PathBuf::from(v);
        }
        if let Ok(v) = env::var("CHUKCHA_LISTEN") {
            self.listen = v
                .parse()
                .map_err(|e| Error::Config(format!("invalid CHUKCHA_LISTEN: {e}")))?;
        }
        if let Ok(v) = env::var("CHUKCHA_ETCD") {
            self.etcd_endpoints = split_endpoints(&v);
        }
        if let Ok(v) = env::var("CHUKCHA_LOG_LEVEL") {
            self.logging.level = v;
        }

        Ok(())
    }

    /// Validate required fields and directory writability.
    pub fn validate(&self) -> Result<()> {
        if self.instance_name.trim().is_empty() {
            return Err(Error::Config("instance-name is required".to_string()));
        }
        if self.dirname.as_os_str().is_empty() {
            return Err(Error::Config("dirname is required".to_string()));
        }

        std::fs::create_dir_all(&self.dirname)
            .map_err(|e| Error::Config(format!("dirname {:?} is not writable: {e}", self.dirname)))?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(Error::Config(format!("invalid log level: {other}"))),
        }

        Ok(())
    }
}

/// Split a comma-separated endpoint list, trimming blanks.
pub fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
