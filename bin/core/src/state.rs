use std::sync::{Arc, OnceLock};

use armada_client::{
  entities::host::HostConfig,
  error::{AddErrorKind, ErrorKind, Result},
};
use cache::CloneCache;

use crate::{
  compose::cache::DiscoveryCache,
  config::core_config,
  docker::DockerClient,
  registry::{HostRegistry, load_registry},
  ssh::SshPool,
};

/// Should be called during startup so an invalid registry crashes
/// the process before any request is served.
pub fn host_registry() -> &'static HostRegistry {
  static HOST_REGISTRY: OnceLock<HostRegistry> = OnceLock::new();
  HOST_REGISTRY.get_or_init(|| {
    load_registry(core_config().hosts.clone())
      .expect("invalid host registry")
  })
}

pub fn ssh_pool() -> &'static SshPool {
  static SSH_POOL: OnceLock<SshPool> = OnceLock::new();
  SSH_POOL.get_or_init(Default::default)
}

pub fn discovery_cache() -> &'static DiscoveryCache {
  static DISCOVERY_CACHE: OnceLock<DiscoveryCache> = OnceLock::new();
  DISCOVERY_CACHE.get_or_init(|| {
    let config = core_config();
    DiscoveryCache::new(
      config.cache_dir.clone(),
      std::time::Duration::from_secs(
        config.cache_ttl_hours * 3600,
      ),
    )
  })
}

fn docker_clients() -> &'static CloneCache<String, Arc<DockerClient>>
{
  static DOCKER_CLIENTS: OnceLock<
    CloneCache<String, Arc<DockerClient>>,
  > = OnceLock::new();
  DOCKER_CLIENTS.get_or_init(Default::default)
}

/// Engine client for a host, connected lazily and shared across
/// requests. Connection failures are not cached.
pub async fn docker_client(
  host: &HostConfig,
) -> Result<Arc<DockerClient>> {
  if let Some(client) = docker_clients().get(&host.name).await {
    return Ok(client);
  }
  let client = Arc::new(
    DockerClient::connect(host)
      .with_kind(ErrorKind::Connectivity)?,
  );
  docker_clients()
    .insert(host.name.clone(), client.clone())
    .await;
  Ok(client)
}
