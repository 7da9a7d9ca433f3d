//! Construction configuration for tiled matrices

use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, Result};

/// Default key prefix under which matrix objects are stored
pub const DEFAULT_PREFIX: &str = "tilestore.objects/";

/// Environment variable consulted by [`MatrixConfig::resolve_bucket`]
pub const BUCKET_ENV_VAR: &str = "TILESTORE_BUCKET";

/// Default number of read attempts per block
pub const DEFAULT_READ_ATTEMPTS: usize = 5;

/// Configuration for opening a matrix
///
/// `shape` and `tile_shape` are only consulted when no header is stored yet;
/// a stored header always wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Bucket name; resolved from the environment when absent
    #[serde(default)]
    pub bucket: Option<String>,
    /// Matrix namespace key
    pub key: String,
    #[serde(default)]
    pub shape: Option<(usize, usize)>,
    #[serde(default, alias = "shard_sizes")]
    pub tile_shape: Option<(usize, usize)>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_one")]
    pub replication_factor: usize,
    #[serde(default = "default_read_attempts")]
    pub read_attempts: usize,
    /// Worker threads used by sharding when no pool is supplied
    #[serde(default = "default_parallelism")]
    pub shard_parallelism: usize,
    /// Try the other replicas after the chosen one keeps failing
    #[serde(default)]
    pub replica_fallback: bool,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_one() -> usize {
    1
}

fn default_read_attempts() -> usize {
    DEFAULT_READ_ATTEMPTS
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl MatrixConfig {
    /// Configuration for `key` with every other field defaulted
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            bucket: None,
            key: key.into(),
            shape: None,
            tile_shape: None,
            prefix: default_prefix(),
            replication_factor: 1,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            shard_parallelism: default_parallelism(),
            replica_fallback: false,
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_shape(mut self, rows: usize, cols: usize) -> Self {
        self.shape = Some((rows, cols));
        self
    }

    pub fn with_tile_shape(mut self, tile_rows: usize, tile_cols: usize) -> Self {
        self.tile_shape = Some((tile_rows, tile_cols));
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: usize) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_read_attempts(mut self, read_attempts: usize) -> Self {
        self.read_attempts = read_attempts;
        self
    }

    pub fn with_shard_parallelism(mut self, threads: usize) -> Self {
        self.shard_parallelism = threads;
        self
    }

    pub fn with_replica_fallback(mut self, enabled: bool) -> Self {
        self.replica_fallback = enabled;
        self
    }

    /// Parse a configuration from JSON, applying defaults for absent fields
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MatrixError::Config(format!("invalid matrix config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that cannot be represented by the types alone
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(MatrixError::Config("matrix key must not be empty".into()));
        }
        if self.replication_factor == 0 {
            return Err(MatrixError::Config("replication factor must be positive".into()));
        }
        if self.read_attempts == 0 {
            return Err(MatrixError::Config("read attempts must be positive".into()));
        }
        if self.shard_parallelism == 0 {
            return Err(MatrixError::Config("shard parallelism must be positive".into()));
        }
        Ok(())
    }

    /// Fill in the bucket from `lookup(BUCKET_ENV_VAR)` when unset
    ///
    /// Pass `|name| std::env::var(name).ok()` to read the process
    /// environment.
    pub fn resolve_bucket<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.bucket.is_none() {
            self.bucket = lookup(BUCKET_ENV_VAR).filter(|b| !b.is_empty());
        }
        if self.bucket.is_none() {
            return Err(MatrixError::Config(format!(
                "no bucket configured and {BUCKET_ENV_VAR} is unset"
            )));
        }
        Ok(self)
    }
}
