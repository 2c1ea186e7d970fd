use std::{sync::OnceLock, time::Duration};

use armada_client::{
  api::image::*,
  entities::{
    Ack, ExecResult, armada_timestamp,
    docker::image::{ImageInfo, PullResult},
    host::HostConfig,
  },
  error::{AddErrorKind, Error, ErrorKind, Result},
};
use cache::TimeoutCache;
use resolver_api::Resolve;

use crate::{
  config::core_config,
  exec::exec_checked,
  helpers::{collect_partial, fan_out, paginate, validate_page},
  state::{docker_client, host_registry},
};

use super::Args;

/// Window where simultaneous / rapid fire pulls of the same image
/// on the same host coalesce into one pull.
const PULL_TIMEOUT_MS: i64 = 5_000;

fn pull_cache() -> &'static TimeoutCache<String, PullResult> {
  static PULL_CACHE: OnceLock<TimeoutCache<String, PullResult>> =
    OnceLock::new();
  PULL_CACHE.get_or_init(Default::default)
}

/// Pull an image on one host, deduplicating rapid-fire pulls.
pub async fn pull_with_dedup(
  host: &HostConfig,
  image: &str,
) -> Result<PullResult> {
  let lock = pull_cache()
    .get_lock(format!("{}/{image}", host.name))
    .await;

  // Simultaneous pulls wait here for the first to finish, then
  // read its result out of the window cache.
  let mut locked = lock.lock().await;
  if locked.last_ts + PULL_TIMEOUT_MS > armada_timestamp() {
    return locked.clone_res().map_err(Error::from);
  }

  let res: anyhow::Result<PullResult> = async {
    let client = docker_client(host).await.map_err(|e| e.error)?;
    client.pull_image(image).await.map_err(|e| e.error)
  }
  .await;
  locked.set(&res, armada_timestamp());
  res.map_err(Error::from)
}

pub async fn list_images_impl(
  host: Option<&str>,
  limit: i64,
  offset: i64,
) -> Result<Vec<ImageInfo>> {
  validate_page(limit, offset)?;
  let hosts = host_registry().all_or_one(host)?;
  let outcomes = fan_out(hosts, |host| async move {
    docker_client(host).await?.list_images().await
  })
  .await;
  let mut images: Vec<ImageInfo> =
    collect_partial("image list", outcomes)
      .into_iter()
      .flatten()
      .collect();
  images.sort_by(|a, b| {
    (&a.host, a.tags.first()).cmp(&(&b.host, b.tags.first()))
  });
  Ok(paginate(images, limit, offset))
}

pub async fn pull_impl(
  image: &str,
  host: Option<&str>,
) -> Result<Vec<PullResult>> {
  validations::validate_image_ref(image)
    .with_kind(ErrorKind::InvalidInput)?;
  let hosts = host_registry().all_or_one(host)?;
  let outcomes = fan_out(hosts, |host| async move {
    pull_with_dedup(host, image).await
  })
  .await;
  let mut results = collect_partial("image pull", outcomes);
  results.sort_by(|a, b| a.host.cmp(&b.host));
  Ok(results)
}

pub async fn remove_impl(
  image: &str,
  host: Option<&str>,
  force: bool,
) -> Result<Vec<Ack>> {
  validations::validate_image_ref(image)
    .with_kind(ErrorKind::InvalidInput)?;
  let hosts = host_registry().all_or_one(host)?;
  let outcomes = fan_out(hosts, |host| async move {
    docker_client(host)
      .await?
      .remove_image(image, force)
      .await?;
    Ok(Ack {
      host: host.name.clone(),
      subject: image.to_string(),
      action: String::from("remove"),
    })
  })
  .await;
  let mut acks = collect_partial("image remove", outcomes);
  acks.sort_by(|a, b| a.host.cmp(&b.host));
  Ok(acks)
}

/// `docker build` through the host executor, with both paths
/// canonicalized first. Builds need a single target host.
pub async fn build_impl(
  tag: &str,
  context_path: &str,
  dockerfile_path: Option<&str>,
  host: Option<&str>,
) -> Result<ExecResult> {
  validations::validate_image_ref(tag)
    .with_kind(ErrorKind::InvalidInput)?;
  let context = validations::validate_secure_path(context_path)
    .with_kind(ErrorKind::InvalidInput)?;
  let dockerfile = match dockerfile_path {
    Some(path) => validations::validate_secure_path(path)
      .with_kind(ErrorKind::InvalidInput)?,
    None => format!("{context}/Dockerfile"),
  };

  let host = require_one_host(host)?;
  let opts = crate::exec::default_exec_opts().timeout(
    Duration::from_secs(core_config().build_timeout_secs),
  );
  exec_checked(
    host,
    "docker",
    &[
      String::from("build"),
      String::from("-t"),
      tag.to_string(),
      String::from("-f"),
      dockerfile,
      context,
    ],
    &opts,
  )
  .await
}

/// Builds target exactly one host: the named one, or the only
/// registered host.
fn require_one_host(
  host: Option<&str>,
) -> Result<&'static HostConfig> {
  match host {
    Some(name) => host_registry().find_by_name(name),
    None => {
      let hosts = host_registry().list();
      match hosts {
        [only] => Ok(only),
        _ => Err(Error::msg(
          ErrorKind::InvalidInput,
          "'host' is required when more than one host is registered",
        )),
      }
    }
  }
}

impl Resolve<Args> for ImageList {
  async fn resolve(self, _: &Args) -> Result<Vec<ImageInfo>> {
    list_images_impl(self.host.as_deref(), self.limit, self.offset)
      .await
  }
}

impl Resolve<Args> for ImagePull {
  #[instrument(
    "ImagePull",
    skip_all,
    fields(id = args.id.to_string(), image = self.image)
  )]
  async fn resolve(self, args: &Args) -> Result<Vec<PullResult>> {
    pull_impl(&self.image, self.host.as_deref()).await
  }
}

impl Resolve<Args> for ImageBuild {
  #[instrument(
    "ImageBuild",
    skip_all,
    fields(id = args.id.to_string(), tag = self.tag)
  )]
  async fn resolve(self, args: &Args) -> Result<ExecResult> {
    build_impl(
      &self.tag,
      &self.context_path,
      self.dockerfile_path.as_deref(),
      self.host.as_deref(),
    )
    .await
  }
}

impl Resolve<Args> for ImageRemove {
  async fn resolve(self, _: &Args) -> Result<Vec<Ack>> {
    remove_impl(&self.image, self.host.as_deref(), self.force).await
  }
}
