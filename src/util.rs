use crate::channel::Channel;
use crate::error::Result;
use crate::router::partition_name;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const PARTITION_DIR_PREFIX: &str = "p_";

/// Directory holding one partition of a channel.
pub fn partition_dir(root: &Path, channel: Channel, partition: u32) -> PathBuf {
  root.join(partition_name(channel, partition))
}

/// Parses a partition number from a partition directory name (`p_0007`).
pub fn parse_partition_dir(name: &str) -> Option<u32> {
  let digits = name.strip_prefix(PARTITION_DIR_PREFIX)?;
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  digits.parse::<u32>().ok()
}

/// Replaces `dir/filename` with `bytes` using temp file + rename.
///
/// With `durable`, both the file and the directory entry are fsynced.
pub fn write_atomically(dir: &Path, filename: &str, bytes: &[u8], durable: bool) -> Result<()> {
  let temp_path = dir.join(format!("{}.tmp", filename));
  let final_path = dir.join(filename);

  let mut file = File::create(&temp_path)?;
  file.write_all(bytes)?;
  if durable {
    file.sync_all()?;
  }
  drop(file);

  fs::rename(&temp_path, &final_path)?;

  if durable {
    File::open(dir)?.sync_all()?;
  }

  Ok(())
}
