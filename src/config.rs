use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Defines how often the file store flushes data to the physical disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
  /// Call `fsync` after every committed append.
  /// Safest, but highest latency.
  Strict,

  /// Never call `fsync` automatically. Commits reach the OS buffer only.
  /// Fastest, but an acknowledged append may be lost on power failure.
  Async,
}

/// Policy for handling corrupted data during partition recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionPolicy {
  /// Truncate the entry log at the last valid frame and log a warning.
  Truncate,

  /// Return a fatal error. The store will not open until the file is fixed.
  Error,
}

#[derive(Debug, Clone)]
pub struct SyncLogOptions {
  /// Base directory where channel and partition directories are created.
  pub root_path: PathBuf,

  /// Number of partitions per channel. Must be at least 1 and must stay
  /// fixed for the life of any reader's paging session.
  /// Default: 1.
  pub shard_count: u32,

  pub sync_mode: SyncMode,
  pub on_corruption: CorruptionPolicy,

  /// Maximum commit attempts for a single append before giving up with
  /// `Error::WriteConflict`.
  /// Default: 16.
  pub max_append_retries: u32,

  /// Read partitions on scoped threads during `sync`.
  /// Default: true.
  pub parallel_reads: bool,

  /// When set, the shard count is re-read from `SYNCLOG_SHARD_COUNT` at most
  /// once per TTL instead of being fixed at open.
  /// Default: None.
  pub shard_count_ttl: Option<Duration>,
}

impl Default for SyncLogOptions {
  fn default() -> Self {
    Self {
      root_path: PathBuf::from("./synclog_data"),
      shard_count: 1,
      sync_mode: SyncMode::Strict,
      on_corruption: CorruptionPolicy::Truncate,
      max_append_retries: 16,
      parallel_reads: true,
      shard_count_ttl: None,
    }
  }
}

impl SyncLogOptions {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      root_path: path.into(),
      ..Default::default()
    }
  }

  /// Loads options from the environment (and a `.env` file, if present).
  ///
  /// Recognized variables: `SYNCLOG_ROOT`, `SYNCLOG_SHARD_COUNT`,
  /// `SYNCLOG_SYNC_MODE` (`strict` or `async`), `SYNCLOG_MAX_APPEND_RETRIES`,
  /// `SYNCLOG_SHARD_COUNT_TTL_SECS`. Unset variables keep their defaults.
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Same as `from_env`, reading variables through `lookup`.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut opts = Self::default();

    if let Some(root) = lookup("SYNCLOG_ROOT") {
      opts.root_path = PathBuf::from(root);
    }

    if let Some(raw) = lookup(SHARD_COUNT_VAR) {
      opts.shard_count = parse_shard_count(&raw)?;
    }

    if let Some(raw) = lookup("SYNCLOG_SYNC_MODE") {
      opts.sync_mode = match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => SyncMode::Strict,
        "async" => SyncMode::Async,
        other => {
          return Err(Error::Configuration(format!(
            "SYNCLOG_SYNC_MODE must be 'strict' or 'async', got '{}'",
            other
          )));
        }
      };
    }

    if let Some(raw) = lookup("SYNCLOG_MAX_APPEND_RETRIES") {
      opts.max_append_retries = raw
        .trim()
        .parse()
        .map_err(|e| Error::Configuration(format!("SYNCLOG_MAX_APPEND_RETRIES must be a valid number: {e}")))?;
    }

    if let Some(raw) = lookup("SYNCLOG_SHARD_COUNT_TTL_SECS") {
      let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|e| Error::Configuration(format!("SYNCLOG_SHARD_COUNT_TTL_SECS must be a valid number: {e}")))?;
      opts.shard_count_ttl = Some(Duration::from_secs(secs));
    }

    opts.validate()?;
    Ok(opts)
  }

  pub fn validate(&self) -> Result<()> {
    if self.shard_count == 0 {
      return Err(Error::Configuration("shard_count must be greater than zero".into()));
    }
    if self.max_append_retries == 0 {
      return Err(Error::Configuration("max_append_retries must be greater than zero".into()));
    }
    Ok(())
  }
}

pub(crate) const SHARD_COUNT_VAR: &str = "SYNCLOG_SHARD_COUNT";

fn parse_shard_count(raw: &str) -> Result<u32> {
  let count: u32 = raw
    .trim()
    .parse()
    .map_err(|e| Error::Configuration(format!("{SHARD_COUNT_VAR} must be a valid number: {e}")))?;
  if count == 0 {
    return Err(Error::Configuration(format!("{SHARD_COUNT_VAR} must be greater than zero")));
  }
  Ok(count)
}

/// Supplies the current shard count.
pub trait ShardCountSource: Send + Sync {
  fn shard_count(&self) -> Result<u32>;
}

/// A shard count fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct FixedShardCount(u32);

impl FixedShardCount {
  pub fn new(shard_count: u32) -> Result<Self> {
    if shard_count == 0 {
      return Err(Error::Configuration("shard_count must be greater than zero".into()));
    }
    Ok(Self(shard_count))
  }
}

impl ShardCountSource for FixedShardCount {
  fn shard_count(&self) -> Result<u32> {
    Ok(self.0)
  }
}

/// A shard count re-read through `loader` once the cached value is older
/// than `ttl`.
pub struct CachedShardCount<F> {
  loader: F,
  ttl: Duration,
  cached: Mutex<Option<(u32, Instant)>>,
}

impl<F> CachedShardCount<F>
where
  F: Fn() -> Result<u32> + Send + Sync,
{
  pub fn new(loader: F, ttl: Duration) -> Self {
    Self {
      loader,
      ttl,
      cached: Mutex::new(None),
    }
  }
}

impl CachedShardCount<Box<dyn Fn() -> Result<u32> + Send + Sync>> {
  /// Reads `SYNCLOG_SHARD_COUNT` from the process environment, falling back
  /// to `fallback` while the variable is unset.
  pub fn from_env(fallback: u32, ttl: Duration) -> Self {
    let loader: Box<dyn Fn() -> Result<u32> + Send + Sync> = Box::new(move || match env::var(SHARD_COUNT_VAR) {
      Ok(raw) => parse_shard_count(&raw),
      Err(_) => Ok(fallback),
    });
    Self::new(loader, ttl)
  }
}

impl<F> ShardCountSource for CachedShardCount<F>
where
  F: Fn() -> Result<u32> + Send + Sync,
{
  fn shard_count(&self) -> Result<u32> {
    let mut cached = self.cached.lock();
    if let Some((count, loaded_at)) = *cached {
      if loaded_at.elapsed() < self.ttl {
        return Ok(count);
      }
    }

    let count = (self.loader)()?;
    if count == 0 {
      return Err(Error::Configuration("shard_count must be greater than zero".into()));
    }
    *cached = Some((count, Instant::now()));
    Ok(count)
  }
}
