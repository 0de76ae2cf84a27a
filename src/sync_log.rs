//! SyncLog implementation - the main public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use serde_json::Value;

use crate::channel::Channel;
use crate::config::{CachedShardCount, FixedShardCount, ShardCountSource, SyncLogOptions};
use crate::error::Result;
use crate::reader::{Reader, SyncPage};
use crate::store::{FileStore, MemoryStore, PartitionKey, PartitionStore};
use crate::writer::{AppendReceipt, Writer};

/// A sharded synchronization log.
///
/// Writers append tracked resources per channel; each append lands in the
/// partition its participant routes to and receives the next position of
/// that partition. Readers page through a channel with an opaque token that
/// records their position in every partition.
///
/// The shard count is read from a `ShardCountSource` on every call. Changing
/// it invalidates all outstanding tokens: the next `sync` with an old token
/// restarts every partition from zero.
///
/// # Example
///
/// ```no_run
/// use synclog::{Channel, SyncLog, SyncLogOptions};
/// use serde_json::json;
///
/// # fn main() -> synclog::Result<()> {
/// let mut opts = SyncLogOptions::new("./synclog_data");
/// opts.shard_count = 4;
/// let log = SyncLog::open(opts)?;
///
/// log.append(Channel::PhysicalMeasurements, "P123", json!({"height_cm": 172}))?;
///
/// let mut token: Option<String> = None;
/// loop {
///     let page = log.sync(Channel::PhysicalMeasurements, token.as_deref(), 100)?;
///     // Deliver page.resources...
///     token = Some(page.token);
///     if !page.more_available {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct SyncLog {
  store: Arc<dyn PartitionStore>,
  shard_count: Arc<dyn ShardCountSource>,
  writer: Writer,
  reader: Reader,
  last_shard_count: AtomicU32,
}

impl SyncLog {
  /// Opens a durable log under `opts.root_path`.
  ///
  /// # Errors
  ///
  /// Returns error if:
  /// - the options are invalid (zero shard count or retry budget)
  /// - the store cannot be recovered
  pub fn open(opts: SyncLogOptions) -> Result<Self> {
    opts.validate()?;
    let store = FileStore::open(opts.root_path.clone(), opts.sync_mode, opts.on_corruption)?;
    Self::with_store(Arc::new(store), opts)
  }

  /// Creates a volatile log. Nothing survives the process.
  pub fn in_memory(opts: SyncLogOptions) -> Result<Self> {
    Self::with_store(Arc::new(MemoryStore::new()), opts)
  }

  /// Creates a log over any store.
  pub fn with_store(store: Arc<dyn PartitionStore>, opts: SyncLogOptions) -> Result<Self> {
    opts.validate()?;

    let shard_count: Arc<dyn ShardCountSource> = match opts.shard_count_ttl {
      Some(ttl) => Arc::new(CachedShardCount::from_env(opts.shard_count, ttl)),
      None => Arc::new(FixedShardCount::new(opts.shard_count)?),
    };

    let log = Self {
      writer: Writer::new(store.clone(), opts.max_append_retries),
      reader: Reader::new(store.clone(), opts.parallel_reads),
      store,
      shard_count,
      last_shard_count: AtomicU32::new(0),
    };

    let current = log.shard_count()?;
    tracing::info!(target: "synclog", "SyncLog ready with {} partitions per channel", current);

    Ok(log)
  }

  /// Replaces the shard count source, e.g. with one backed by a config
  /// service.
  pub fn with_shard_count_source(mut self, source: Arc<dyn ShardCountSource>) -> Self {
    self.shard_count = source;
    self
  }

  /// Returns the current shard count.
  ///
  /// Logs a warning when it differs from the last value observed, since every
  /// outstanding token becomes a full resync.
  pub fn shard_count(&self) -> Result<u32> {
    let current = self.shard_count.shard_count()?;
    let previous = self.last_shard_count.swap(current, Ordering::AcqRel);
    if previous != 0 && previous != current {
      tracing::warn!(
        target: "synclog",
        "Shard count changed from {} to {}; outstanding tokens will restart from zero",
        previous,
        current
      );
    }
    Ok(current)
  }

  /// Appends a resource to `channel` on behalf of `participant_id`.
  ///
  /// Callers should retry on `Error::WriteConflict`.
  pub fn append(&self, channel: Channel, participant_id: &str, resource: Value) -> Result<AppendReceipt> {
    let shard_count = self.shard_count()?;
    self.writer.append(channel, participant_id, resource, shard_count)
  }

  /// Serializes `resource` to JSON and appends it.
  pub fn append_resource<T: Serialize>(
    &self,
    channel: Channel,
    participant_id: &str,
    resource: &T,
  ) -> Result<AppendReceipt> {
    let value = serde_json::to_value(resource)?;
    self.append(channel, participant_id, value)
  }

  /// Reads the next page of `channel` after `token`.
  ///
  /// `None` starts from the beginning. `max_results` must be at least the
  /// shard count.
  pub fn sync(&self, channel: Channel, token: Option<&str>, max_results: usize) -> Result<SyncPage> {
    let shard_count = self.shard_count()?;
    self.reader.sync(channel, token, max_results, shard_count)
  }

  /// Snapshot of every partition counter of `channel`, indexed by partition.
  ///
  /// `token::encode(&counters)` is the token of a reader that has consumed
  /// everything committed so far.
  pub fn counters(&self, channel: Channel) -> Result<Vec<u64>> {
    let shard_count = self.shard_count()?;
    (0..shard_count)
      .map(|partition| self.store.counter(PartitionKey::new(channel, partition)))
      .collect()
  }

  /// Returns a reference to the underlying store.
  pub fn store(&self) -> &Arc<dyn PartitionStore> {
    &self.store
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use crate::token;
  use serde_json::json;
  use std::sync::atomic::AtomicU32;
  use std::time::Duration;

  fn memory_log(shard_count: u32) -> SyncLog {
    let mut opts = SyncLogOptions::default();
    opts.shard_count = shard_count;
    SyncLog::in_memory(opts).unwrap()
  }

  #[test]
  fn test_rejects_invalid_options() {
    let mut opts = SyncLogOptions::default();
    opts.shard_count = 0;
    assert!(matches!(SyncLog::in_memory(opts), Err(Error::Configuration(_))));

    let mut opts = SyncLogOptions::default();
    opts.max_append_retries = 0;
    assert!(matches!(SyncLog::in_memory(opts), Err(Error::Configuration(_))));
  }

  #[test]
  fn test_counters_match_caught_up_token() {
    let log = memory_log(4);
    for i in 0..40 {
      log
        .append(Channel::BiobankOrders, &format!("participant_{}", i), json!(i))
        .unwrap();
    }

    let mut token: Option<String> = None;
    loop {
      let page = log.sync(Channel::BiobankOrders, token.as_deref(), 8).unwrap();
      token = Some(page.token);
      if !page.more_available {
        break;
      }
    }

    let counters = log.counters(Channel::BiobankOrders).unwrap();
    assert_eq!(counters.iter().sum::<u64>(), 40);
    assert_eq!(token.unwrap(), token::encode(&counters));
  }

  #[test]
  fn test_channels_are_isolated() {
    let log = memory_log(2);
    log.append(Channel::PhysicalMeasurements, "P123", json!("pm")).unwrap();

    let page = log.sync(Channel::BiobankOrders, None, 2).unwrap();
    assert!(page.resources.is_empty());
    assert_eq!(page.token, "0|0");
  }

  #[test]
  fn test_append_resource_serializes() {
    #[derive(Serialize)]
    struct Order {
      id: u32,
      tests: Vec<&'static str>,
    }

    let log = memory_log(1);
    log
      .append_resource(
        Channel::BiobankOrders,
        "P123",
        &Order {
          id: 9,
          tests: vec!["1ED10"],
        },
      )
      .unwrap();

    let page = log.sync(Channel::BiobankOrders, None, 1).unwrap();
    assert_eq!(page.resources, vec![json!({"id": 9, "tests": ["1ED10"]})]);
  }

  #[test]
  fn test_shard_count_change_restarts_readers() {
    struct Switchable(AtomicU32);
    impl ShardCountSource for Switchable {
      fn shard_count(&self) -> Result<u32> {
        Ok(self.0.load(Ordering::SeqCst))
      }
    }

    let source = Arc::new(Switchable(AtomicU32::new(1)));
    let log = memory_log(1).with_shard_count_source(source.clone());

    log.append(Channel::PhysicalMeasurements, "P123", json!("foo")).unwrap();
    let page = log.sync(Channel::PhysicalMeasurements, None, 2).unwrap();
    assert_eq!(page.token, "1");

    source.0.store(2, Ordering::SeqCst);
    let resync = log.sync(Channel::PhysicalMeasurements, Some(&page.token), 2).unwrap();

    // P123 still lives in partition 0 of the old layout, which is read again.
    assert_eq!(resync.resources, vec![json!("foo")]);
    assert_eq!(resync.token, "1|0");
  }

  #[test]
  fn test_ttl_source_is_used() {
    let mut opts = SyncLogOptions::default();
    opts.shard_count = 3;
    opts.shard_count_ttl = Some(Duration::from_secs(3600));
    let log = SyncLog::in_memory(opts).unwrap();

    // Without the environment variable the configured count applies.
    if std::env::var("SYNCLOG_SHARD_COUNT").is_err() {
      assert_eq!(log.shard_count().unwrap(), 3);
    }
  }
}
