//! Persistence capability behind the write and read paths.
//!
//! A `PartitionStore` owns the counter and the entries of every
//! `(channel, partition)` pair. Its single write primitive is a
//! compare-and-swap commit: the entry and the bumped counter become visible
//! together, or nothing is written at all.

mod file;
mod memory;
mod partition_map;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::channel::Channel;
use crate::entry::LogEntry;
use crate::error::Result;

/// Identifies one partition of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
  pub channel: Channel,
  pub partition: u32,
}

impl PartitionKey {
  pub fn new(channel: Channel, partition: u32) -> Self {
    Self { channel, partition }
  }
}

/// Outcome of a compare-and-swap commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
  /// The entry and the new counter value were persisted together.
  Applied,
  /// The counter no longer matched the expected value. Nothing was written.
  Conflict { actual: u64 },
}

pub trait PartitionStore: Send + Sync {
  /// Current counter of a partition. A partition never written to is at 0.
  fn counter(&self, key: PartitionKey) -> Result<u64>;

  /// Persists `entry` and sets the counter to `entry.position`, provided the
  /// counter is still `expected` and `entry.position == expected + 1`.
  fn commit(&self, key: PartitionKey, expected: u64, entry: &LogEntry) -> Result<Commit>;

  /// Committed entries with `position > after`, ascending, at most `limit`.
  fn scan(&self, key: PartitionKey, after: u64, limit: usize) -> Result<Vec<LogEntry>>;
}
