use armada_client::{
  entities::docker::network::NetworkInfo, error::Result,
};
use bollard::query_parameters::ListNetworksOptions;

use super::{DockerClient, classify_docker_err};

impl DockerClient {
  pub async fn list_networks(&self) -> Result<Vec<NetworkInfo>> {
    let networks = self
      .docker
      .list_networks(Option::<ListNetworksOptions>::None)
      .await
      .map_err(classify_docker_err)?
      .into_iter()
      .map(|network| {
        let subnets = network
          .ipam
          .and_then(|ipam| ipam.config)
          .unwrap_or_default()
          .into_iter()
          .filter_map(|config| config.subnet)
          .collect();
        NetworkInfo {
          host: self.host.clone(),
          id: network.id.unwrap_or_default(),
          name: network.name.unwrap_or_default(),
          driver: network.driver,
          scope: network.scope,
          internal: network.internal.unwrap_or_default(),
          attachable: network.attachable.unwrap_or_default(),
          subnets,
        }
      })
      .collect();
    Ok(networks)
  }
}
