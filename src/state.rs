use crate::error::{Error, Result};
use crate::util;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

/// Persisted partition counter, stored in the `counter.state` file of each
/// partition directory.
///
/// The entry log is authoritative: this file is rewritten after every commit
/// and reconciled against the last valid frame during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterStateFile {
  pub counter: u64,
}

impl CounterStateFile {
  pub const FILENAME: &'static str = "counter.state";
  pub const VERSION: u8 = 1;
  const SIZE: usize = 1 + 8;

  /// Reads the state file from a partition directory.
  pub fn read_from(partition_dir: &Path) -> Result<Option<Self>> {
    let path = partition_dir.join(Self::FILENAME);
    let file = match File::open(path) {
      Ok(f) => f,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);

    let version = reader.read_u8()?;
    if version != Self::VERSION {
      return Err(Error::Corruption(format!(
        "Unsupported {} version: expected {}, got {}",
        Self::FILENAME,
        Self::VERSION,
        version
      )));
    }

    let counter = reader.read_u64::<LittleEndian>()?;
    Ok(Some(Self { counter }))
  }

  /// Atomically replaces the state file.
  pub fn write_to(&self, partition_dir: &Path, durable: bool) -> Result<()> {
    let mut buf = Vec::with_capacity(Self::SIZE);
    buf.write_u8(Self::VERSION)?;
    buf.write_u64::<LittleEndian>(self.counter)?;
    util::write_atomically(partition_dir, Self::FILENAME, &buf, durable)
  }
}
