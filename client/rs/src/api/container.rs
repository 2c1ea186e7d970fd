use resolver_api::Resolve;
use serde::{Deserialize, Serialize};

use crate::{
  api::{default_limit, default_lines},
  entities::{
    Ack, ExecResult,
    docker::{
      container::{
        ContainerDetails, ContainerInfo, ContainerState,
        ContainerStatsRow, LogEntry, ProcessList,
      },
      image::PullResult,
    },
  },
  error::Error,
};

/// List containers across one host or the whole fleet, with
/// post-filters and deterministic pagination.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<ContainerInfo>)]
#[error(Error)]
pub struct ContainerList {
  #[serde(default)]
  pub host: Option<String>,
  /// Keep only containers in this state.
  #[serde(default)]
  pub state: Option<ContainerState>,
  /// Name substring filter.
  #[serde(default)]
  pub name: Option<String>,
  /// Image substring filter.
  #[serde(default)]
  pub image: Option<String>,
  /// `key=value` label filter.
  #[serde(default)]
  pub label: Option<String>,
  #[serde(default = "default_limit")]
  pub limit: i64,
  #[serde(default)]
  pub offset: i64,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Ack)]
#[error(Error)]
pub struct ContainerStart {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Ack)]
#[error(Error)]
pub struct ContainerStop {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Ack)]
#[error(Error)]
pub struct ContainerRestart {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Ack)]
#[error(Error)]
pub struct ContainerPause {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Ack)]
#[error(Error)]
pub struct ContainerUnpause {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

/// Bounded log retrieval with optional substring filter.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<LogEntry>)]
#[error(Error)]
pub struct ContainerLogs {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
  /// Max 500.
  #[serde(default = "default_lines")]
  pub lines: i64,
  /// Keep only lines containing this substring.
  #[serde(default)]
  pub grep: Option<String>,
  /// Enable `--timestamps`
  #[serde(default)]
  pub timestamps: bool,
}

//

/// Stats for one container, or aggregate mode over all running
/// containers on the selected hosts when `container` is omitted.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<ContainerStatsRow>)]
#[error(Error)]
pub struct ContainerStats {
  #[serde(default, alias = "container_id")]
  pub container: Option<String>,
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ContainerDetails)]
#[error(Error)]
pub struct ContainerInspect {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

/// Substring search over container names and images, fleet-wide.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<ContainerInfo>)]
#[error(Error)]
pub struct ContainerSearch {
  pub query: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default = "default_limit")]
  pub limit: i64,
  #[serde(default)]
  pub offset: i64,
}

//

/// Pull the image currently used by the named container.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(PullResult)]
#[error(Error)]
pub struct ContainerPull {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

/// Inspect current config, stop + remove, optionally pull, re-create
/// with the same config (host config + networks preserved), start.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Ack)]
#[error(Error)]
pub struct ContainerRecreate {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
  /// Pull the image before re-creating.
  #[serde(default)]
  pub pull: bool,
}

//

/// Run an allow-listed command inside a running container.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ExecResult)]
#[error(Error)]
pub struct ContainerExec {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
  /// Validated against the command allow list before any Engine
  /// call is issued.
  pub command: String,
  /// Max 300000.
  #[serde(default, alias = "timeoutMs")]
  pub timeout_ms: Option<u64>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ProcessList)]
#[error(Error)]
pub struct ContainerTop {
  #[serde(alias = "container_id")]
  pub container: String,
  #[serde(default)]
  pub host: Option<String>,
}
