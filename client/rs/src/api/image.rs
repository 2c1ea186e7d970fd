use resolver_api::Resolve;
use serde::{Deserialize, Serialize};

use crate::{
  api::default_limit,
  entities::{
    Ack, ExecResult,
    docker::image::{ImageInfo, PullResult},
  },
  error::Error,
};

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<ImageInfo>)]
#[error(Error)]
pub struct ImageList {
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
pub struct ImagePull {
  pub image: String,
  #[serde(default)]
  pub host: Option<String>,
}

//

/// `docker build` with tag and paths validated through the path
/// canonicalizer. 10 minute deadline.
#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(ExecResult)]
#[error(Error)]
pub struct ImageBuild {
  pub tag: String,
  pub context_path: String,
  #[serde(default)]
  pub dockerfile_path: Option<String>,
  #[serde(default)]
  pub host: Option<String>,
}

//

#[derive(Serialize, Deserialize, Debug, Clone, Resolve)]
#[response(Vec<Ack>)]
#[error(Error)]
pub struct ImageRemove {
  pub image: String,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub force: bool,
}
