//! Read path: one bounded scan per partition, assembled partition-major.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::Channel;
use crate::entry::LogEntry;
use crate::error::{Error, Result};
use crate::store::{PartitionKey, PartitionStore};
use crate::token;

/// One page of a channel's change stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPage {
  /// Resource payloads: partition 0's batch, then partition 1's, and so on.
  pub resources: Vec<Value>,
  /// Opaque token to pass to the next call.
  pub token: String,
  /// At least one partition had entries beyond this page.
  #[serde(rename = "more")]
  pub more_available: bool,
}

pub struct Reader {
  store: Arc<dyn PartitionStore>,
  parallel: bool,
}

impl Reader {
  pub fn new(store: Arc<dyn PartitionStore>, parallel: bool) -> Self {
    Self { store, parallel }
  }

  /// Reads the next page of `channel` after `previous_token`.
  ///
  /// Each partition contributes at most `max_results / shard_count` entries.
  /// A token issued under another shard count restarts every partition.
  ///
  /// # Errors
  ///
  /// - `Error::Configuration` if `shard_count` is zero
  /// - `Error::InvalidArgument` if `max_results < shard_count`
  /// - `Error::MalformedToken` if the token has a non-numeric component
  pub fn sync(
    &self,
    channel: Channel,
    previous_token: Option<&str>,
    max_results: usize,
    shard_count: u32,
  ) -> Result<SyncPage> {
    if shard_count == 0 {
      return Err(Error::Configuration("shard_count must be greater than zero".into()));
    }
    if max_results < shard_count as usize {
      return Err(Error::InvalidArgument(format!(
        "max_results ({}) must be at least the shard count ({})",
        max_results, shard_count
      )));
    }

    let mut positions = token::decode(previous_token, shard_count)?;
    let per_partition = max_results / shard_count as usize;

    // One extra row per partition tells us whether more is available.
    let batches = self.read_partitions(channel, &positions, per_partition.saturating_add(1))?;

    let fetched = batches.iter().map(|b| b.len().min(per_partition)).sum();
    let mut resources = Vec::with_capacity(fetched);
    let mut more_available = false;

    for (partition, mut batch) in batches.into_iter().enumerate() {
      if batch.len() > per_partition {
        more_available = true;
        batch.truncate(per_partition);
      }
      if let Some(last) = batch.last() {
        positions[partition] = last.position;
      }
      resources.extend(batch.into_iter().map(|e| e.resource));
    }

    Ok(SyncPage {
      resources,
      token: token::encode(&positions),
      more_available,
    })
  }

  /// Scans every partition past its cursor. The result is indexed by
  /// partition regardless of which scan finished first.
  fn read_partitions(&self, channel: Channel, positions: &[u64], limit: usize) -> Result<Vec<Vec<LogEntry>>> {
    let scan = |(partition, &after): (usize, &u64)| {
      self
        .store
        .scan(PartitionKey::new(channel, partition as u32), after, limit)
    };

    if !self.parallel || positions.len() == 1 {
      return positions.iter().enumerate().map(scan).collect();
    }

    thread::scope(|s| {
      let handles: Vec<_> = positions
        .iter()
        .enumerate()
        .map(|item| s.spawn(move || scan(item)))
        .collect();

      handles
        .into_iter()
        .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
        .collect()
    })
  }
}
