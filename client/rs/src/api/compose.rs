use resolver_api::Resolve;
use serde::{Deserialize, Serialize};

use crate::{
  api::default_lines,
  entities::{
    ExecResult,
    compose::{
      ComposeActionResponse, ComposePsItem, ComposeProjectInfo,
      ComposeRecreateResponse, DiscoveredProject,
    },
  },
  error::Error,
};

/// Discovered compose projects across one host or the fleet.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<ComposeProjectInfo>)]
#[error(Error)]
pub struct ComposeList {
  #[serde(default)]
  pub host: Option<String>,
}

//

/// `docker compose ps` for one project.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<ComposePsItem>)]
#[error(Error)]
pub struct ComposeStatus {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

/// `docker compose up -d`, resolving the compose file through the
/// discovery layers when `host` is omitted.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ComposeActionResponse)]
#[error(Error)]
pub struct ComposeUp {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
  /// Free-form `docker compose up` arguments; shell-token vetted.
  #[serde(default)]
  pub extra_args: Vec<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ComposeActionResponse)]
#[error(Error)]
pub struct ComposeDown {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
  #[serde(default)]
  pub extra_args: Vec<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ComposeActionResponse)]
#[error(Error)]
pub struct ComposeRestart {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ExecResult)]
#[error(Error)]
pub struct ComposeLogs {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
  /// Max 500.
  #[serde(default = "default_lines")]
  pub tail: i64,
  /// Enable `--timestamps`
  #[serde(default)]
  pub timestamps: bool,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ComposeActionResponse)]
#[error(Error)]
pub struct ComposeBuild {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
  #[serde(default)]
  pub extra_args: Vec<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ComposeActionResponse)]
#[error(Error)]
pub struct ComposePull {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
}

//

/// `down` then `up -d`.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ComposeRecreateResponse)]
#[error(Error)]
pub struct ComposeRecreate {
  pub project: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub services: Vec<String>,
}

//

/// Drop cached discovery state and re-discover, returning the
/// refreshed project mappings.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<DiscoveredProject>)]
#[error(Error)]
pub struct ComposeRefresh {
  #[serde(default)]
  pub host: Option<String>,
  /// Refresh a single project instead of the whole host.
  #[serde(default)]
  pub project: Option<String>,
}
