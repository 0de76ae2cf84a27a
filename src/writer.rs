//! Write path: route, then commit the next position with a bounded
//! compare-and-swap loop.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::channel::Channel;
use crate::entry::LogEntry;
use crate::error::{Error, Result};
use crate::router;
use crate::store::{Commit, PartitionKey, PartitionStore};

/// Where an append landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendReceipt {
  pub channel: Channel,
  pub partition: u32,
  pub position: u64,
}

pub struct Writer {
  store: Arc<dyn PartitionStore>,
  max_attempts: u32,
}

impl Writer {
  pub fn new(store: Arc<dyn PartitionStore>, max_attempts: u32) -> Self {
    Self {
      store,
      max_attempts: max_attempts.max(1),
    }
  }

  /// Appends `resource` to the partition `participant_id` routes to.
  ///
  /// All-or-nothing: on any error no entry is visible, so the caller may
  /// retry the whole append.
  ///
  /// # Errors
  ///
  /// - `Error::Configuration` if `shard_count` is zero
  /// - `Error::InvalidArgument` if `participant_id` is empty
  /// - `Error::WriteConflict` if every attempt lost the race for the
  ///   partition counter
  pub fn append(
    &self,
    channel: Channel,
    participant_id: &str,
    resource: Value,
    shard_count: u32,
  ) -> Result<AppendReceipt> {
    let partition = router::route(participant_id, shard_count)?;
    let key = PartitionKey::new(channel, partition);

    let mut expected = self.store.counter(key)?;
    let mut entry = LogEntry::new(expected + 1, participant_id, resource);

    for attempt in 1..=self.max_attempts {
      match self.store.commit(key, expected, &entry)? {
        Commit::Applied => {
          tracing::trace!(
            target: "synclog",
            "Appended {} partition {} position {}",
            channel,
            partition,
            entry.position
          );
          return Ok(AppendReceipt {
            channel,
            partition,
            position: entry.position,
          });
        }
        Commit::Conflict { actual } => {
          tracing::debug!(
            target: "synclog",
            "Counter race on {} partition {} (attempt {}/{}): expected {}, found {}",
            channel,
            partition,
            attempt,
            self.max_attempts,
            expected,
            actual
          );
          expected = actual;
          entry.position = actual + 1;
          std::thread::yield_now();
        }
      }
    }

    let err = Error::WriteConflict {
      channel: channel.name().to_string(),
      partition,
      attempts: self.max_attempts,
    };
    tracing::warn!(target: "synclog", kind = err.kind_label(), "{}", err);
    Err(err)
  }
}
