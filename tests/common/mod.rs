#![allow(dead_code)]

use synclog::{Channel, SyncLog, SyncLogOptions, SyncMode};
use tempfile::TempDir;

pub struct TestEnv {
  pub log: SyncLog,
  // The TempDir guard must be kept alive to prevent premature deletion of the directory.
  pub _dir: TempDir,
  pub opts: SyncLogOptions,
}

impl TestEnv {
  pub fn new(mut opts: SyncLogOptions) -> Self {
    let dir = tempfile::tempdir().unwrap();
    opts.root_path = dir.path().to_path_buf();
    let log = SyncLog::open(opts.clone()).unwrap();

    Self { log, _dir: dir, opts }
  }

  pub fn with_shards(shard_count: u32) -> Self {
    let mut opts = SyncLogOptions::default();
    opts.shard_count = shard_count;
    opts.sync_mode = SyncMode::Async; // Faster; durability is covered by the recovery tests
    Self::new(opts)
  }

  /// Drops the open log and reopens the same directory.
  pub fn restart(&mut self) {
    self.log = SyncLog::open(self.opts.clone()).unwrap();
  }
}

pub fn memory_log(shard_count: u32) -> SyncLog {
  let mut opts = SyncLogOptions::default();
  opts.shard_count = shard_count;
  SyncLog::in_memory(opts).unwrap()
}

/// Follows a channel from `token` until no partition reports more data.
/// Returns every delivered resource and the final token.
pub fn drain(
  log: &SyncLog,
  channel: Channel,
  mut token: Option<String>,
  max_results: usize,
) -> (Vec<serde_json::Value>, String) {
  let mut delivered = Vec::new();
  loop {
    let page = log.sync(channel, token.as_deref(), max_results).unwrap();
    delivered.extend(page.resources);
    token = Some(page.token);
    if !page.more_available {
      return (delivered, token.unwrap());
    }
  }
}
