use crate::entry::LogEntry;
use crate::error::Result;
use crate::store::partition_map::PartitionMap;
use crate::store::{Commit, PartitionKey, PartitionStore};

/// Volatile store. Partition entries live in a `Vec` whose length is the
/// partition counter, so positions are dense by construction.
pub struct MemoryStore {
  partitions: PartitionMap<Vec<LogEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      partitions: PartitionMap::new(),
    }
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl PartitionStore for MemoryStore {
  fn counter(&self, key: PartitionKey) -> Result<u64> {
    Ok(
      self
        .partitions
        .get(key)
        .map(|p| p.lock().len() as u64)
        .unwrap_or(0),
    )
  }

  fn commit(&self, key: PartitionKey, expected: u64, entry: &LogEntry) -> Result<Commit> {
    let partition = self.partitions.get_or_try_create(key, || Ok(Vec::new()))?;
    let mut entries = partition.lock();

    let actual = entries.len() as u64;
    if actual != expected || entry.position != expected + 1 {
      return Ok(Commit::Conflict { actual });
    }

    entries.push(entry.clone());
    Ok(Commit::Applied)
  }

  fn scan(&self, key: PartitionKey, after: u64, limit: usize) -> Result<Vec<LogEntry>> {
    let Some(partition) = self.partitions.get(key) else {
      return Ok(Vec::new());
    };
    let entries = partition.lock();

    // Position p lives at index p - 1.
    let start = usize::try_from(after).unwrap_or(usize::MAX).min(entries.len());
    Ok(entries[start..].iter().take(limit).cloned().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel::Channel;
  use serde_json::json;

  const PM0: PartitionKey = PartitionKey {
    channel: Channel::PhysicalMeasurements,
    partition: 0,
  };

  #[test]
  fn test_absent_partition_is_zero() {
    let store = MemoryStore::new();
    assert_eq!(store.counter(PM0).unwrap(), 0);
    assert!(store.scan(PM0, 0, 10).unwrap().is_empty());
  }

  #[test]
  fn test_commit_and_scan() {
    let store = MemoryStore::new();
    for i in 1..=5u64 {
      let entry = LogEntry::new(i, "P1", json!(i));
      assert_eq!(store.commit(PM0, i - 1, &entry).unwrap(), Commit::Applied);
    }

    assert_eq!(store.counter(PM0).unwrap(), 5);

    let positions: Vec<u64> = store.scan(PM0, 2, 2).unwrap().iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![3, 4]);
    assert!(store.scan(PM0, 5, 10).unwrap().is_empty());
    assert!(store.scan(PM0, 500, 10).unwrap().is_empty());
  }

  #[test]
  fn test_stale_expectation_conflicts() {
    let store = MemoryStore::new();
    store.commit(PM0, 0, &LogEntry::new(1, "P1", json!("a"))).unwrap();

    let result = store.commit(PM0, 0, &LogEntry::new(1, "P1", json!("b"))).unwrap();
    assert_eq!(result, Commit::Conflict { actual: 1 });

    // Position must be expected + 1
    let result = store.commit(PM0, 1, &LogEntry::new(5, "P1", json!("c"))).unwrap();
    assert_eq!(result, Commit::Conflict { actual: 1 });

    assert_eq!(store.counter(PM0).unwrap(), 1);
    assert_eq!(store.scan(PM0, 0, 10).unwrap()[0].resource, json!("a"));
  }

  #[test]
  fn test_partitions_are_independent() {
    let store = MemoryStore::new();
    let bo3 = PartitionKey::new(Channel::BiobankOrders, 3);

    store.commit(PM0, 0, &LogEntry::new(1, "P1", json!(1))).unwrap();
    store.commit(bo3, 0, &LogEntry::new(1, "P2", json!(2))).unwrap();
    store.commit(bo3, 1, &LogEntry::new(2, "P2", json!(3))).unwrap();

    assert_eq!(store.counter(PM0).unwrap(), 1);
    assert_eq!(store.counter(bo3).unwrap(), 2);
    assert_eq!(store.counter(PartitionKey::new(Channel::BiobankOrders, 0)).unwrap(), 0);
  }
}
