//! Participant-based routing to determine partition assignment.
//!
//! Uses CRC32 (IEEE), which is fully specified and therefore stable across
//! processes, platforms and compiler releases. Changing the hash moves
//! participants between partitions, which invalidates every outstanding
//! pagination token exactly like a shard-count change does.

use crate::channel::Channel;
use crate::error::{Error, Result};

/// Routing hash of a participant id: CRC32 (IEEE) over its UTF-8 bytes.
#[inline]
pub fn participant_hash(participant_id: &str) -> u32 {
  crc32fast::hash(participant_id.as_bytes())
}

/// Routes a participant to its partition.
///
/// # Returns
///
/// A partition in the range `0..shard_count`.
///
/// # Errors
///
/// - `Error::Configuration` if `shard_count` is zero
/// - `Error::InvalidArgument` if `participant_id` is empty
#[inline]
pub fn route(participant_id: &str, shard_count: u32) -> Result<u32> {
  if shard_count == 0 {
    return Err(Error::Configuration("shard_count must be greater than zero".into()));
  }
  if participant_id.is_empty() {
    return Err(Error::InvalidArgument("participant_id cannot be empty".into()));
  }
  Ok(participant_hash(participant_id) % shard_count)
}

/// Stable storage name for a partition of a channel.
///
/// Format: `"physical_measurements/p_0000"`, `"biobank_orders/p_0013"`, etc.
pub fn partition_name(channel: Channel, partition: u32) -> String {
  format!("{}/p_{:04}", channel.name(), partition)
}
