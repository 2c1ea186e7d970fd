use resolver_api::Resolve;
use serde::{Deserialize, Serialize};

use crate::{
  api::default_limit,
  entities::{
    Ack, ExecResult,
    docker::{
      EngineDiskUsage, EngineInfo, PruneRow, PruneTarget,
      image::{ImageInfo, PullResult},
      network::NetworkInfo,
      volume::VolumeInfo,
    },
  },
  error::Error,
};

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<EngineInfo>)]
#[error(Error)]
pub struct DockerInfo {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<EngineDiskUsage>)]
#[error(Error)]
pub struct DockerDf {
  #[serde(default)]
  pub host: Option<String>,
}

//

/// Destructive; requires `force: true` or fails immediately with
/// no side effects. A single target's failure lands in that
/// target's row, never the whole request.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<PruneRow>)]
#[error(Error)]
pub struct DockerPrune {
  #[serde(default)]
  pub host: Option<String>,
  /// Defaults to every prune target.
  #[serde(default)]
  pub targets: Vec<PruneTarget>,
  #[serde(default)]
  pub force: bool,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<ImageInfo>)]
#[error(Error)]
pub struct DockerImages {
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default = "default_limit")]
  pub limit: i64,
  #[serde(default)]
  pub offset: i64,
}

//

/// Pull on one host, or across the fleet when `host` is omitted.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<PullResult>)]
#[error(Error)]
pub struct DockerPull {
  pub image: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

/// `docker build` on the target host. 10 minute deadline.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ExecResult)]
#[error(Error)]
pub struct DockerBuild {
  pub tag: String,
  /// Build context directory on the host.
  pub context_path: String,
  /// Defaults to `<context>/Dockerfile`.
  #[serde(default)]
  pub dockerfile_path: Option<String>,
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<Ack>)]
#[error(Error)]
pub struct DockerRmi {
  pub image: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub force: bool,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<NetworkInfo>)]
#[error(Error)]
pub struct DockerNetworks {
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<VolumeInfo>)]
#[error(Error)]
pub struct DockerVolumes {
  #[serde(default)]
  pub host: Option<String>,
}
