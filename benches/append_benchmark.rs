use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use synclog::{Channel, SyncLog, SyncLogOptions, SyncMode};
use tempfile::TempDir;

// Helper to create a durable log in a temporary directory for isolated benchmark runs.
fn setup_log(shard_count: u32, sync_mode: SyncMode) -> (SyncLog, TempDir) {
  let dir = tempfile::tempdir().unwrap();
  let mut opts = SyncLogOptions::new(dir.path());
  opts.shard_count = shard_count;
  opts.sync_mode = sync_mode;
  let log = SyncLog::open(opts).unwrap();
  (log, dir)
}

fn bench_appends(c: &mut Criterion) {
  let mut group = c.benchmark_group("Append Operations");
  let resource = json!({"systolic": 120, "diastolic": 80, "note": "x".repeat(200)});

  for &(name, sync_mode) in &[("strict", SyncMode::Strict), ("async", SyncMode::Async)] {
    group.bench_function(format!("append_file_{}", name), |b| {
      let (log, _dir) = setup_log(4, sync_mode);
      let mut i = 0u64;
      b.iter(|| {
        i += 1;
        let participant = format!("P{}", i % 1000);
        log
          .append(Channel::PhysicalMeasurements, &participant, black_box(resource.clone()))
          .unwrap();
      })
    });
  }

  // Hot partition: every append contends for the same counter.
  for shard_count in [1u32, 16] {
    group.bench_with_input(BenchmarkId::new("append_memory", shard_count), &shard_count, |b, &sc| {
      let mut opts = SyncLogOptions::default();
      opts.shard_count = sc;
      let log = SyncLog::in_memory(opts).unwrap();
      let mut i = 0u64;
      b.iter(|| {
        i += 1;
        let participant = format!("P{}", i % 1000);
        log
          .append(Channel::PhysicalMeasurements, &participant, black_box(resource.clone()))
          .unwrap();
      })
    });
  }

  group.finish();
}

criterion_group!(benches, bench_appends);
criterion_main!(benches);
