use armada_client::{
  entities::docker::volume::VolumeInfo, error::Result,
};
use bollard::query_parameters::ListVolumesOptions;

use super::{DockerClient, classify_docker_err};

impl DockerClient {
  pub async fn list_volumes(&self) -> Result<Vec<VolumeInfo>> {
    let volumes = self
      .docker
      .list_volumes(Option::<ListVolumesOptions>::None)
      .await
      .map_err(classify_docker_err)?
      .volumes
      .unwrap_or_default()
      .into_iter()
      .map(|volume| VolumeInfo {
        host: self.host.clone(),
        name: volume.name,
        driver: volume.driver,
        mountpoint: volume.mountpoint,
        created: volume.created_at,
        size_bytes: volume.usage_data.map(|data| data.size),
      })
      .collect();
    Ok(volumes)
  }
}
