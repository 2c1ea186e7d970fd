use std::{collections::HashMap, hash::Hash, sync::Arc};

use tokio::sync::{Mutex, RwLock};

/// Prevents simultaneous / rapid fire access to an action,
/// returning the cached result instead in these situations.
#[derive(Default)]
pub struct TimeoutCache<K, Res>(
  Mutex<HashMap<K, Arc<Mutex<CacheEntry<Res>>>>>,
);

impl<K: Eq + Hash, Res: Default> TimeoutCache<K, Res> {
  pub async fn get_lock(
    &self,
    key: K,
  ) -> Arc<Mutex<CacheEntry<Res>>> {
    let mut lock = self.0.lock().await;
    lock.entry(key).or_default().clone()
  }
}

pub struct CacheEntry<Res> {
  /// The last cached ts
  pub last_ts: i64,
  /// The last cached result
  pub res: anyhow::Result<Res>,
}

impl<Res: Default> Default for CacheEntry<Res> {
  fn default() -> Self {
    CacheEntry {
      last_ts: 0,
      res: Ok(Res::default()),
    }
  }
}

impl<Res: Clone> CacheEntry<Res> {
  pub fn set(&mut self, res: &anyhow::Result<Res>, timestamp: i64) {
    self.res = res.as_ref().map_err(clone_anyhow_error).cloned();
    self.last_ts = timestamp;
  }

  pub fn clone_res(&self) -> anyhow::Result<Res> {
    self.res.as_ref().map_err(clone_anyhow_error).cloned()
  }
}

fn clone_anyhow_error(e: &anyhow::Error) -> anyhow::Error {
  let mut reasons =
    e.chain().map(|e| e.to_string()).collect::<Vec<_>>();
  // Always guaranteed to be at least one reason
  // Need to start the chain with the last reason
  let mut e = anyhow::Error::msg(reasons.pop().unwrap());
  // Need to reverse reason application from lowest context to highest context.
  for reason in reasons.into_iter().rev() {
    e = e.context(reason)
  }
  e
}

#[derive(Debug)]
pub struct CloneCache<K: PartialEq + Eq + Hash, T: Clone>(
  RwLock<HashMap<K, T>>,
);

impl<K: PartialEq + Eq + Hash, T: Clone> Default
  for CloneCache<K, T>
{
  fn default() -> Self {
    Self(RwLock::new(HashMap::new()))
  }
}

impl<K: PartialEq + Eq + Hash + std::fmt::Debug + Clone, T: Clone>
  CloneCache<K, T>
{
  pub async fn get(&self, key: &K) -> Option<T> {
    self.0.read().await.get(key).cloned()
  }

  pub async fn get_keys(&self) -> Vec<K> {
    let cache = self.0.read().await;
    cache.keys().cloned().collect()
  }

  pub async fn get_values(&self) -> Vec<T> {
    let cache = self.0.read().await;
    cache.values().cloned().collect()
  }

  pub async fn insert<Key>(&self, key: Key, val: T) -> Option<T>
  where
    Key: Into<K> + std::fmt::Debug,
  {
    self.0.write().await.insert(key.into(), val)
  }

  pub async fn remove(&self, key: &K) -> Option<T> {
    self.0.write().await.remove(key)
  }
}

#[cfg(test)]
mod tests {
  use anyhow::anyhow;

  use super::*;

  #[tokio::test]
  async fn clone_cache_insert_get_remove() {
    let cache: CloneCache<String, u64> = Default::default();
    assert!(cache.get(&"a".to_string()).await.is_none());
    cache.insert("a".to_string(), 1).await;
    assert_eq!(cache.get(&"a".to_string()).await, Some(1));
    assert_eq!(cache.remove(&"a".to_string()).await, Some(1));
    assert!(cache.get(&"a".to_string()).await.is_none());
  }

  #[tokio::test]
  async fn timeout_cache_replays_cached_result() {
    let cache: TimeoutCache<String, u64> = Default::default();
    let lock = cache.get_lock("pull:redis".to_string()).await;
    {
      let mut entry = lock.lock().await;
      entry.set(&Ok(7), 1000);
    }
    let lock = cache.get_lock("pull:redis".to_string()).await;
    let entry = lock.lock().await;
    assert_eq!(entry.last_ts, 1000);
    assert_eq!(entry.clone_res().unwrap(), 7);
  }

  #[tokio::test]
  async fn cache_entry_error_chain_survives_clone() {
    let entry: Arc<Mutex<CacheEntry<u64>>> = Default::default();
    let res: anyhow::Result<u64> =
      Err(anyhow!("root cause").context("outer context"));
    entry.lock().await.set(&res, 5);
    let cloned = entry.lock().await.clone_res().unwrap_err();
    let chain =
      cloned.chain().map(|e| e.to_string()).collect::<Vec<_>>();
    assert_eq!(chain, vec!["outer context", "root cause"]);
  }
}
