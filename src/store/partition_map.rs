use crate::error::Result;
use crate::store::PartitionKey;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe map of per-partition state.
///
/// Each partition has its own lock, so writers on different partitions never
/// contend beyond the brief read lock on the map itself.
pub(crate) struct PartitionMap<T> {
  inner: RwLock<HashMap<PartitionKey, Arc<Mutex<T>>>>,
}

impl<T> PartitionMap<T> {
  pub fn new() -> Self {
    Self {
      inner: RwLock::new(HashMap::new()),
    }
  }

  /// Gets a handle to the partition's state, initializing it if needed.
  ///
  /// Double-checked: the common case only takes the read lock. `init` runs
  /// at most once per key, under the write lock.
  pub fn get_or_try_create<F>(&self, key: PartitionKey, init: F) -> Result<Arc<Mutex<T>>>
  where
    F: FnOnce() -> Result<T>,
  {
    {
      let map = self.inner.read();
      if let Some(state) = map.get(&key) {
        return Ok(state.clone());
      }
    }

    let mut map = self.inner.write();
    if let Some(state) = map.get(&key) {
      return Ok(state.clone());
    }

    let state = Arc::new(Mutex::new(init()?));
    map.insert(key, state.clone());
    Ok(state)
  }

  /// Gets a handle to an existing partition's state. Does not create.
  pub fn get(&self, key: PartitionKey) -> Option<Arc<Mutex<T>>> {
    self.inner.read().get(&key).cloned()
  }

  pub fn insert(&self, key: PartitionKey, state: T) {
    self.inner.write().insert(key, Arc::new(Mutex::new(state)));
  }

  pub fn len(&self) -> usize {
    self.inner.read().len()
  }
}
