//! The compose discovery cache: one JSON document per host under
//! the cache directory, updated by atomic replace. Readers tolerate
//! absence and corruption by treating the cache as empty.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use armada_client::entities::{
  armada_timestamp,
  compose::{CachedProject, HostDiscovery},
};
use dashmap::DashMap;
use tokio::sync::Mutex;

pub struct DiscoveryCache {
  dir: PathBuf,
  ttl: Duration,
  /// Serializes load-modify-write cycles per host. Hosts never
  /// contend with each other.
  locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DiscoveryCache {
  pub fn new(dir: PathBuf, ttl: Duration) -> DiscoveryCache {
    DiscoveryCache {
      dir,
      ttl,
      locks: DashMap::new(),
    }
  }

  fn host_file(&self, host: &str) -> PathBuf {
    self.dir.join(format!("{host}.json"))
  }

  fn host_lock(&self, host: &str) -> Arc<Mutex<()>> {
    self
      .locks
      .entry(host.to_string())
      .or_default()
      .clone()
  }

  /// Read a host's document, treating any IO or parse failure as
  /// an empty cache.
  pub async fn load(&self, host: &str) -> HostDiscovery {
    let path = self.host_file(host);
    let Ok(contents) = tokio::fs::read_to_string(&path).await
    else {
      return HostDiscovery::default();
    };
    match serde_json::from_str(&contents) {
      Ok(doc) => doc,
      Err(e) => {
        warn!(
          "discovery cache for host {host} is corrupt, treating as empty | {e}"
        );
        HostDiscovery::default()
      }
    }
  }

  /// A project entry, only while fresh under the TTL.
  pub async fn get_project(
    &self,
    host: &str,
    project: &str,
  ) -> Option<CachedProject> {
    let doc = self.load(host).await;
    let entry = doc.projects.get(project)?;
    let age_ms = armada_timestamp() - entry.last_seen;
    if age_ms <= self.ttl.as_millis() as i64 {
      Some(entry.clone())
    } else {
      None
    }
  }

  pub async fn update_project(
    &self,
    host: &str,
    project: &str,
    entry: CachedProject,
  ) -> anyhow::Result<()> {
    let lock = self.host_lock(host);
    let _guard = lock.lock().await;
    let mut doc = self.load(host).await;
    doc.projects.insert(project.to_string(), entry);
    self.write_atomic(host, &doc).await
  }

  pub async fn remove_project(
    &self,
    host: &str,
    project: &str,
  ) -> anyhow::Result<()> {
    let lock = self.host_lock(host);
    let _guard = lock.lock().await;
    let mut doc = self.load(host).await;
    if doc.projects.remove(project).is_none() {
      return Ok(());
    }
    self.write_atomic(host, &doc).await
  }

  /// Replace a host's whole document (refresh path).
  pub async fn replace_host(
    &self,
    host: &str,
    doc: &HostDiscovery,
  ) -> anyhow::Result<()> {
    let lock = self.host_lock(host);
    let _guard = lock.lock().await;
    self.write_atomic(host, doc).await
  }

  /// Write temp + rename, so a crash mid-write never leaves a
  /// partial document behind.
  async fn write_atomic(
    &self,
    host: &str,
    doc: &HostDiscovery,
  ) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&self.dir)
      .await
      .with_context(|| {
        format!(
          "failed to create cache directory {}",
          self.dir.display()
        )
      })?;
    let path = self.host_file(host);
    let tmp = self.dir.join(format!("{host}.json.tmp"));
    let contents = serde_json::to_string_pretty(doc)
      .context("failed to serialize discovery cache document")?;
    tokio::fs::write(&tmp, contents).await.with_context(|| {
      format!("failed to write cache temp file {}", tmp.display())
    })?;
    tokio::fs::rename(&tmp, &path).await.with_context(|| {
      format!("failed to replace cache file {}", path.display())
    })
  }
}

#[cfg(test)]
mod tests {
  use armada_client::entities::compose::DiscoverySource;

  use super::*;

  fn entry(path: &str, last_seen: i64) -> CachedProject {
    CachedProject {
      path: path.to_string(),
      name: String::from("plex"),
      discovered_from: DiscoverySource::DockerLs,
      last_seen,
    }
  }

  fn cache(dir: &std::path::Path) -> DiscoveryCache {
    DiscoveryCache::new(
      dir.to_path_buf(),
      Duration::from_secs(24 * 3600),
    )
  }

  #[tokio::test]
  async fn update_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    cache
      .update_project(
        "tower",
        "plex",
        entry("/stacks/plex/compose.yml", armada_timestamp()),
      )
      .await
      .unwrap();

    let got = cache.get_project("tower", "plex").await.unwrap();
    assert_eq!(got.path, "/stacks/plex/compose.yml");

    // The temp file never survives a completed write.
    assert!(!dir.path().join("tower.json.tmp").exists());
    // And the persisted file is valid JSON.
    let raw = std::fs::read_to_string(
      dir.path().join("tower.json"),
    )
    .unwrap();
    let doc: HostDiscovery = serde_json::from_str(&raw).unwrap();
    assert!(doc.projects.contains_key("plex"));
  }

  #[tokio::test]
  async fn stale_entries_are_not_returned() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    let stale = armada_timestamp() - 25 * 3600 * 1000;
    cache
      .update_project("tower", "plex", entry("/old/path", stale))
      .await
      .unwrap();
    assert!(cache.get_project("tower", "plex").await.is_none());
  }

  #[tokio::test]
  async fn corrupt_files_read_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tower.json"), b"{ not json")
      .unwrap();
    let cache = cache(dir.path());
    assert!(cache.load("tower").await.projects.is_empty());
    assert!(cache.get_project("tower", "plex").await.is_none());

    // A write through the same path repairs the file.
    cache
      .update_project(
        "tower",
        "plex",
        entry("/stacks/plex/compose.yml", armada_timestamp()),
      )
      .await
      .unwrap();
    assert!(cache.get_project("tower", "plex").await.is_some());
  }

  #[tokio::test]
  async fn remove_project_invalidates() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache(dir.path());
    cache
      .update_project(
        "tower",
        "plex",
        entry("/old/path", armada_timestamp()),
      )
      .await
      .unwrap();
    cache.remove_project("tower", "plex").await.unwrap();
    assert!(cache.get_project("tower", "plex").await.is_none());
    // Removing again is a no-op.
    cache.remove_project("tower", "plex").await.unwrap();
  }

  #[tokio::test]
  async fn missing_directory_reads_as_empty() {
    let cache = DiscoveryCache::new(
      PathBuf::from("/definitely/not/here"),
      Duration::from_secs(60),
    );
    assert!(cache.load("tower").await.projects.is_empty());
  }
}
