use std::path::Path;

use armada_client::{
  entities::{
    docker::{EngineDiskUsage, EngineInfo},
    host::{HostConfig, HostProtocol, HostStatus},
  },
  error::{Error, ErrorKind, Result},
};
use bollard::{API_DEFAULT_VERSION, Docker};

use crate::config::core_config;

mod containers;
mod exec;
mod images;
mod networks;
mod volumes;

pub use exec::ExecCaps;

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// One host's Docker Engine, reached over the transport its
/// `HostConfig` declares. Safe for concurrent use; the underlying
/// client owns its own connection pool.
pub struct DockerClient {
  host: String,
  docker: Docker,
}

impl DockerClient {
  pub fn connect(host: &HostConfig) -> anyhow::Result<DockerClient> {
    use anyhow::Context;

    let docker = if let Some(socket) = host.unix_socket() {
      Docker::connect_with_unix(
        socket,
        CONNECT_TIMEOUT_SECS,
        API_DEFAULT_VERSION,
      )
      .with_context(|| {
        format!("failed to connect to Engine socket {socket}")
      })?
    } else {
      match host.protocol {
        HostProtocol::Socket => {
          let socket = &core_config().default_socket_path;
          Docker::connect_with_unix(
            socket,
            CONNECT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
          )
          .with_context(|| {
            format!("failed to connect to Engine socket {socket}")
          })?
        }
        HostProtocol::Http => {
          let addr = format!(
            "tcp://{}:{}",
            host.host,
            host.port.unwrap_or(2375)
          );
          Docker::connect_with_http(
            &addr,
            CONNECT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
          )
          .with_context(|| {
            format!("failed to connect to Engine at {addr}")
          })?
        }
        HostProtocol::Https => {
          let addr = format!(
            "tcp://{}:{}",
            host.host,
            host.port.unwrap_or(2376)
          );
          let (key, cert, ca) = match (
            &host.tls_key_path,
            &host.tls_cert_path,
            &host.tls_ca_path,
          ) {
            (Some(key), Some(cert), Some(ca)) => (key, cert, ca),
            _ => anyhow::bail!(
              "host '{}' uses https but is missing tls_key_path / tls_cert_path / tls_ca_path",
              host.name
            ),
          };
          Docker::connect_with_ssl(
            &addr,
            Path::new(key),
            Path::new(cert),
            Path::new(ca),
            CONNECT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
          )
          .with_context(|| {
            format!("failed to connect to Engine at {addr}")
          })?
        }
        HostProtocol::Ssh => {
          let addr = format!("ssh://{}", host.ssh_destination());
          Docker::connect_with_ssh(
            &addr,
            CONNECT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
          )
          .with_context(|| {
            format!("failed to connect to Engine over {addr}")
          })?
        }
      }
    };

    Ok(DockerClient {
      host: host.name.clone(),
      docker,
    })
  }

  pub async fn ping(&self) -> Result<()> {
    self.docker.ping().await.map_err(classify_docker_err)?;
    Ok(())
  }

  pub async fn info(&self) -> Result<EngineInfo> {
    let info =
      self.docker.info().await.map_err(classify_docker_err)?;
    Ok(EngineInfo {
      host: self.host.clone(),
      server_version: info.server_version,
      operating_system: info.operating_system,
      kernel_version: info.kernel_version,
      architecture: info.architecture,
      ncpu: info.ncpu,
      mem_total: info.mem_total,
      storage_driver: info.driver,
      containers: info.containers,
      containers_running: info.containers_running,
      containers_paused: info.containers_paused,
      containers_stopped: info.containers_stopped,
      images: info.images,
    })
  }

  pub async fn status(&self) -> HostStatus {
    let info = self.docker.info().await;
    match info {
      Ok(info) => HostStatus {
        host: self.host.clone(),
        reachable: true,
        engine_version: info.server_version,
        containers_running: info.containers_running,
        containers_total: info.containers,
        error: None,
      },
      Err(e) => HostStatus {
        host: self.host.clone(),
        reachable: false,
        error: Some(format!("{e}")),
        ..Default::default()
      },
    }
  }

  /// Composed from the list endpoints; volume and build cache
  /// sizes are only known when the Engine reports usage data.
  pub async fn disk_usage(&self) -> Result<EngineDiskUsage> {
    use bollard::query_parameters::{
      ListContainersOptions, ListImagesOptions, ListVolumesOptions,
    };

    let (images, containers, volumes) = tokio::try_join!(
      self.docker.list_images(Option::<ListImagesOptions>::None),
      self.docker.list_containers(Some(ListContainersOptions {
        all: true,
        size: true,
        ..Default::default()
      })),
      self.docker.list_volumes(Option::<ListVolumesOptions>::None),
    )
    .map_err(classify_docker_err)?;
    let volumes = volumes.volumes.unwrap_or_default();

    Ok(EngineDiskUsage {
      host: self.host.clone(),
      images_count: images.len(),
      images_size_bytes: images.iter().map(|i| i.size).sum(),
      containers_count: containers.len(),
      containers_size_bytes: containers
        .iter()
        .map(|c| c.size_rw.unwrap_or_default())
        .sum(),
      volumes_count: volumes.len(),
      volumes_size_bytes: volumes
        .iter()
        .filter_map(|v| v.usage_data.as_ref())
        .map(|usage| usage.size)
        .sum(),
      build_cache_size_bytes: 0,
    })
  }

  pub async fn prune_containers(&self) -> Result<(u64, u64)> {
    let res = self
      .docker
      .prune_containers(
        None::<bollard::query_parameters::PruneContainersOptions>,
      )
      .await
      .map_err(classify_docker_err)?;
    Ok((
      res.containers_deleted.unwrap_or_default().len() as u64,
      res.space_reclaimed.unwrap_or_default() as u64,
    ))
  }

  pub async fn prune_images(&self) -> Result<(u64, u64)> {
    let res = self
      .docker
      .prune_images(
        None::<bollard::query_parameters::PruneImagesOptions>,
      )
      .await
      .map_err(classify_docker_err)?;
    Ok((
      res.images_deleted.unwrap_or_default().len() as u64,
      res.space_reclaimed.unwrap_or_default() as u64,
    ))
  }

  pub async fn prune_networks(&self) -> Result<(u64, u64)> {
    let res = self
      .docker
      .prune_networks(
        None::<bollard::query_parameters::PruneNetworksOptions>,
      )
      .await
      .map_err(classify_docker_err)?;
    Ok((res.networks_deleted.unwrap_or_default().len() as u64, 0))
  }

  pub async fn prune_volumes(&self) -> Result<(u64, u64)> {
    let res = self
      .docker
      .prune_volumes(
        None::<bollard::query_parameters::PruneVolumesOptions>,
      )
      .await
      .map_err(classify_docker_err)?;
    Ok((
      res.volumes_deleted.unwrap_or_default().len() as u64,
      res.space_reclaimed.unwrap_or_default() as u64,
    ))
  }
}

/// Map Engine client failures onto the error taxonomy.
pub fn classify_docker_err(e: bollard::errors::Error) -> Error {
  use bollard::errors::Error as DockerError;
  let kind = match &e {
    DockerError::DockerResponseServerError {
      status_code: 404,
      ..
    } => ErrorKind::NotFound,
    DockerError::DockerResponseServerError { .. } => {
      ErrorKind::RemoteFailure
    }
    DockerError::RequestTimeoutError => ErrorKind::Timeout,
    DockerError::IOError { .. }
    | DockerError::HyperResponseError { .. } => {
      ErrorKind::Connectivity
    }
    _ => ErrorKind::RemoteFailure,
  };
  Error::new(kind, e)
}
