//! Concurrent writers and readers

mod common;

use common::{TestEnv, drain};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use synclog::store::PartitionKey;
use synclog::{Channel, SyncLog, SyncLogOptions, SyncMode};

const BO: Channel = Channel::BiobankOrders;

fn contended_log(shard_count: u32) -> TestEnv {
  let mut opts = SyncLogOptions::default();
  opts.shard_count = shard_count;
  opts.sync_mode = SyncMode::Async;
  // Every thread hammers the same counter; give the CAS loop room.
  opts.max_append_retries = 10_000;
  TestEnv::new(opts)
}

#[test]
fn test_concurrent_appends_to_one_partition_are_dense() {
  let env = contended_log(1);
  let log = Arc::new(env.log);

  let handles: Vec<_> = (0..8)
    .map(|thread_id| {
      let log = log.clone();
      thread::spawn(move || {
        (0..50)
          .map(|i| {
            log
              .append(BO, "P123", json!(format!("t{}_{}", thread_id, i)))
              .unwrap()
              .position
          })
          .collect::<Vec<u64>>()
      })
    })
    .collect();

  let mut positions: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
  positions.sort_unstable();

  // No lost updates, no duplicates.
  assert_eq!(positions, (1..=400).collect::<Vec<u64>>());

  let entries = log.store().scan(PartitionKey::new(BO, 0), 0, 1000).unwrap();
  let order: Vec<u64> = entries.iter().map(|e| e.position).collect();
  assert_eq!(order, (1..=400).collect::<Vec<u64>>());
}

#[test]
fn test_concurrent_appends_across_partitions() {
  let env = contended_log(16);
  let log = Arc::new(env.log);

  let handles: Vec<_> = (0..10)
    .map(|thread_id| {
      let log = log.clone();
      thread::spawn(move || {
        for i in 0..100 {
          let participant = format!("thread_{}_participant_{}", thread_id, i);
          log.append(BO, &participant, json!(participant)).unwrap();
        }
      })
    })
    .collect();

  for h in handles {
    h.join().unwrap();
  }

  let counters = log.counters(BO).unwrap();
  assert_eq!(counters.iter().sum::<u64>(), 1000, "Should have all 1000 entries");

  let (delivered, _) = drain(&log, BO, None, 64);
  let unique: HashSet<String> = delivered.iter().map(|v| v.as_str().unwrap().to_string()).collect();
  assert_eq!(delivered.len(), 1000);
  assert_eq!(unique.len(), 1000);
}

#[test]
fn test_reader_follows_live_writers_exactly_once() {
  let env = contended_log(4);
  let log: Arc<SyncLog> = Arc::new(env.log);
  let done = Arc::new(AtomicBool::new(false));

  let writers: Vec<_> = (0..4)
    .map(|thread_id| {
      let log = log.clone();
      thread::spawn(move || {
        for i in 0..250 {
          let id = format!("w{}_{}", thread_id, i);
          log.append(BO, &format!("participant_{}", i % 37), json!(id)).unwrap();
        }
      })
    })
    .collect();

  let reader = {
    let log = log.clone();
    let done = done.clone();
    thread::spawn(move || {
      let mut seen = Vec::new();
      let mut token: Option<String> = None;
      loop {
        // Read the flag before paging so the final pass covers every write.
        let finished = done.load(Ordering::Acquire);
        let page = log.sync(BO, token.as_deref(), 16).unwrap();
        seen.extend(page.resources.into_iter().map(|v| v.as_str().unwrap().to_string()));
        token = Some(page.token);
        if finished && !page.more_available {
          return seen;
        }
      }
    })
  };

  for w in writers {
    w.join().unwrap();
  }
  done.store(true, Ordering::Release);

  let seen = reader.join().unwrap();
  let unique: HashSet<&String> = seen.iter().collect();
  assert_eq!(seen.len(), 1000, "every entry delivered");
  assert_eq!(unique.len(), 1000, "no entry delivered twice");
}
