use serde::{Deserialize, Serialize};

pub mod container;
pub mod image;
pub mod network;
pub mod volume;

/// Engine-level info for `docker.info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineInfo {
  pub host: String,
  pub server_version: Option<String>,
  pub operating_system: Option<String>,
  pub kernel_version: Option<String>,
  pub architecture: Option<String>,
  pub ncpu: Option<i64>,
  pub mem_total: Option<i64>,
  pub storage_driver: Option<String>,
  pub containers: Option<i64>,
  pub containers_running: Option<i64>,
  pub containers_paused: Option<i64>,
  pub containers_stopped: Option<i64>,
  pub images: Option<i64>,
}

/// `docker.df` summary per host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineDiskUsage {
  pub host: String,
  pub images_count: usize,
  pub images_size_bytes: i64,
  pub containers_count: usize,
  pub containers_size_bytes: i64,
  pub volumes_count: usize,
  pub volumes_size_bytes: i64,
  pub build_cache_size_bytes: i64,
}

/// The resource classes `docker.prune` can reclaim.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PruneTarget {
  Containers,
  Images,
  Networks,
  Volumes,
  BuildCache,
}

impl PruneTarget {
  pub fn all() -> Vec<PruneTarget> {
    vec![
      PruneTarget::Containers,
      PruneTarget::Images,
      PruneTarget::Networks,
      PruneTarget::Volumes,
      PruneTarget::BuildCache,
    ]
  }
}

/// One `(host, target)` outcome row. A failed target carries its
/// error here instead of failing the whole request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneRow {
  pub host: String,
  pub target: PruneTarget,
  pub items_deleted: u64,
  pub space_reclaimed_bytes: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}
