//! Durable, file-backed partition store.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   physical_measurements/
//!     p_0000/
//!       entries.log     append-only CRC32 frames, one per entry
//!       counter.state   last committed position
//!     p_0001/ ...
//!   biobank_orders/ ...
//! ```
//!
//! The entry frame is the commit point. `counter.state` is rewritten after
//! each commit and reconciled with the log on open: a torn tail is
//! truncated and the counter always follows the last valid frame.

use crate::channel::Channel;
use crate::config::{CorruptionPolicy, SyncMode};
use crate::entry::LogEntry;
use crate::error::{Error, Result};
use crate::frame;
use crate::state::CounterStateFile;
use crate::store::partition_map::PartitionMap;
use crate::store::{Commit, PartitionKey, PartitionStore};
use crate::util;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

const ENTRIES_FILENAME: &str = "entries.log";

type Handle = Arc<Mutex<FilePartition>>;

struct FilePartition {
  dir: PathBuf,
  /// Opened in append mode. Only touched under the partition lock.
  log: File,
  /// Last committed position.
  counter: u64,
  /// `offsets[i]` is the byte offset of the frame holding position `i + 1`.
  offsets: Vec<u64>,
  /// Length of the log covered by committed frames.
  committed_len: u64,
}

pub struct FileStore {
  root: PathBuf,
  sync_mode: SyncMode,
  on_corruption: CorruptionPolicy,
  partitions: PartitionMap<FilePartition>,
}

impl FileStore {
  /// Opens (or creates) a store rooted at `root`, recovering every partition
  /// found on disk.
  pub fn open(root: impl Into<PathBuf>, sync_mode: SyncMode, on_corruption: CorruptionPolicy) -> Result<Self> {
    let root = root.into();
    fs::create_dir_all(&root)?;

    let store = Self {
      root,
      sync_mode,
      on_corruption,
      partitions: PartitionMap::new(),
    };
    store.recover_all_partitions()?;

    tracing::info!(
      target: "synclog::store",
      "Opened file store at {} ({} partitions recovered)",
      store.root.display(),
      store.partitions.len()
    );

    Ok(store)
  }

  fn recover_all_partitions(&self) -> Result<()> {
    for channel in Channel::ALL {
      let channel_dir = self.root.join(channel.name());
      if !channel_dir.is_dir() {
        continue;
      }

      for entry in fs::read_dir(&channel_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
          continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(partition) = util::parse_partition_dir(&name) else {
          tracing::warn!(target: "synclog::store", "Ignoring unexpected directory {}", entry.path().display());
          continue;
        };

        let state = self.recover_partition(entry.path())?;
        self.partitions.insert(PartitionKey::new(channel, partition), state);
      }
    }
    Ok(())
  }

  /// Rebuilds a partition's in-memory state from its entry log.
  fn recover_partition(&self, dir: PathBuf) -> Result<FilePartition> {
    let log_path = dir.join(ENTRIES_FILENAME);
    let log = OpenOptions::new().create(true).append(true).read(true).open(&log_path)?;
    let file_len = log.metadata()?.len();

    let mut reader = BufReader::new(File::open(&log_path)?);
    let mut offsets = Vec::new();
    let mut valid_end = 0u64;

    while valid_end < file_len {
      match frame::decode(&mut reader, valid_end) {
        Ok((entry, len)) if entry.position == offsets.len() as u64 + 1 => {
          offsets.push(valid_end);
          valid_end += len;
        }
        Ok((entry, _)) => {
          let cause = Error::Corruption(format!(
            "expected position {}, found {}",
            offsets.len() + 1,
            entry.position
          ));
          self.on_corrupt_tail(&log_path, valid_end, file_len, cause)?;
          break;
        }
        Err(e) => {
          self.on_corrupt_tail(&log_path, valid_end, file_len, e)?;
          break;
        }
      }
    }

    if valid_end < file_len {
      log.set_len(valid_end)?;
      log.sync_all()?;
    }

    let counter = offsets.len() as u64;
    self.reconcile_counter(&dir, counter)?;

    Ok(FilePartition {
      dir,
      log,
      counter,
      offsets,
      committed_len: valid_end,
    })
  }

  fn on_corrupt_tail(&self, path: &Path, valid_end: u64, file_len: u64, cause: Error) -> Result<()> {
    match self.on_corruption {
      CorruptionPolicy::Error => Err(Error::Corruption(format!(
        "{} is corrupt at offset {}: {}",
        path.display(),
        valid_end,
        cause
      ))),
      CorruptionPolicy::Truncate => {
        tracing::warn!(
          target: "synclog::store",
          kind = cause.kind_label(),
          "Truncating {} from {} to {} bytes: {}",
          path.display(),
          file_len,
          valid_end,
          cause
        );
        Ok(())
      }
    }
  }

  /// Makes `counter.state` agree with the recovered log.
  fn reconcile_counter(&self, dir: &Path, counter: u64) -> Result<()> {
    let stored = match CounterStateFile::read_from(dir) {
      Ok(state) => state.map(|s| s.counter),
      Err(e) => {
        tracing::warn!(
          target: "synclog::store",
          kind = e.kind_label(),
          "Unreadable counter state in {}: {}",
          dir.display(),
          e
        );
        None
      }
    };

    match stored {
      Some(c) if c == counter => return Ok(()),
      Some(c) if c > counter => {
        tracing::warn!(
          target: "synclog::store",
          "Counter state in {} is ahead of the entry log ({} > {}); rolling back to the log",
          dir.display(),
          c,
          counter
        );
      }
      Some(c) => {
        tracing::warn!(
          target: "synclog::store",
          "Counter state in {} is behind the entry log ({} < {}); rolling forward",
          dir.display(),
          c,
          counter
        );
      }
      None => {}
    }

    CounterStateFile { counter }.write_to(dir, true)
  }

  /// Returns the partition handle if the partition exists in memory or on
  /// disk. Never creates anything.
  fn existing_partition(&self, key: PartitionKey) -> Result<Option<Handle>> {
    if let Some(p) = self.partitions.get(key) {
      return Ok(Some(p));
    }

    let dir = util::partition_dir(&self.root, key.channel, key.partition);
    if !dir.exists() {
      return Ok(None);
    }
    self.partition_or_create(key).map(Some)
  }

  /// Returns the partition handle, initializing an empty partition if needed.
  fn partition_or_create(&self, key: PartitionKey) -> Result<Handle> {
    if let Some(p) = self.partitions.get(key) {
      return Ok(p);
    }

    let dir = util::partition_dir(&self.root, key.channel, key.partition);
    self.partitions.get_or_try_create(key, || {
      fs::create_dir_all(&dir)?;
      self.recover_partition(dir.clone())
    })
  }

  fn append_frame(&self, partition: &mut FilePartition, entry: &LogEntry) -> Result<()> {
    let bytes = frame::encode(entry)?;

    let written = partition.log.write_all(&bytes).and_then(|_| {
      if self.sync_mode == SyncMode::Strict {
        partition.log.sync_data()
      } else {
        Ok(())
      }
    });

    if let Err(e) = written {
      // Drop whatever part of the frame reached the file so the next commit
      // starts on a frame boundary.
      if let Err(trunc) = partition.log.set_len(partition.committed_len) {
        tracing::error!(
          target: "synclog::store",
          "Failed to roll back partial frame in {}: {}",
          partition.dir.display(),
          trunc
        );
      }
      return Err(e.into());
    }

    partition.offsets.push(partition.committed_len);
    partition.committed_len += bytes.len() as u64;
    partition.counter = entry.position;
    Ok(())
  }
}

impl PartitionStore for FileStore {
  fn counter(&self, key: PartitionKey) -> Result<u64> {
    Ok(match self.existing_partition(key)? {
      Some(p) => p.lock().counter,
      None => 0,
    })
  }

  fn commit(&self, key: PartitionKey, expected: u64, entry: &LogEntry) -> Result<Commit> {
    let handle = self.partition_or_create(key)?;
    let mut partition = handle.lock();

    if partition.counter != expected || entry.position != expected + 1 {
      return Ok(Commit::Conflict {
        actual: partition.counter,
      });
    }

    self.append_frame(&mut partition, entry)?;

    // The frame is already committed; a stale counter file is repaired on open.
    let state = CounterStateFile {
      counter: partition.counter,
    };
    if let Err(e) = state.write_to(&partition.dir, self.sync_mode == SyncMode::Strict) {
      tracing::warn!(
        target: "synclog::store",
        "Failed to persist counter state in {}: {}",
        partition.dir.display(),
        e
      );
    }

    Ok(Commit::Applied)
  }

  fn scan(&self, key: PartitionKey, after: u64, limit: usize) -> Result<Vec<LogEntry>> {
    let Some(handle) = self.existing_partition(key)? else {
      return Ok(Vec::new());
    };

    // Snapshot the committed range, then read without holding the lock.
    let (dir, start, end) = {
      let partition = handle.lock();
      if after >= partition.counter || limit == 0 {
        return Ok(Vec::new());
      }
      (
        partition.dir.clone(),
        partition.offsets[after as usize],
        partition.committed_len,
      )
    };

    let mut file = File::open(dir.join(ENTRIES_FILENAME))?;
    file.seek(SeekFrom::Start(start))?;
    let mut reader = BufReader::new(file.take(end - start));

    let mut entries = Vec::new();
    let mut offset = start;
    while offset < end && entries.len() < limit {
      let (entry, len) = frame::decode(&mut reader, offset)?;
      offset += len;
      entries.push(entry);
    }

    Ok(entries)
  }
}
