use armada_client::{
  entities::docker::image::{ImageInfo, PullResult},
  error::Result,
};
use bollard::query_parameters::{
  CreateImageOptionsBuilder, ListImagesOptions,
  RemoveImageOptionsBuilder,
};
use futures::StreamExt;

use super::{DockerClient, classify_docker_err};

impl DockerClient {
  pub async fn list_images(&self) -> Result<Vec<ImageInfo>> {
    let images = self
      .docker
      .list_images(Option::<ListImagesOptions>::None)
      .await
      .map_err(classify_docker_err)?
      .into_iter()
      .map(|image| ImageInfo {
        host: self.host.clone(),
        id: image.id,
        tags: image.repo_tags,
        size_bytes: image.size,
        created: image.created,
      })
      .collect();
    Ok(images)
  }

  /// Pull an image, draining the progress stream and keeping the
  /// final status line.
  pub async fn pull_image(&self, image: &str) -> Result<PullResult> {
    let options =
      CreateImageOptionsBuilder::new().from_image(image).build();
    let mut stream =
      self.docker.create_image(Some(options), None, None);

    let mut status = String::new();
    while let Some(progress) = stream.next().await {
      let progress = progress.map_err(classify_docker_err)?;
      if let Some(line) = progress.status {
        status = line;
      }
    }

    Ok(PullResult {
      host: self.host.clone(),
      image: image.to_string(),
      status,
    })
  }

  pub async fn remove_image(
    &self,
    image: &str,
    force: bool,
  ) -> Result<()> {
    self
      .docker
      .remove_image(
        image,
        Some(RemoveImageOptionsBuilder::new().force(force).build()),
        None,
      )
      .await
      .map_err(classify_docker_err)?;
    Ok(())
  }

  /// The image a container is currently running, for
  /// `container.pull`.
  pub async fn container_image(
    &self,
    container: &str,
  ) -> Result<String> {
    use anyhow::Context;
    use armada_client::error::{AddErrorKind, ErrorKind};
    use bollard::query_parameters::InspectContainerOptions;

    let inspected = self
      .docker
      .inspect_container(
        container,
        InspectContainerOptions { size: false }.into(),
      )
      .await
      .map_err(classify_docker_err)?;
    inspected
      .config
      .and_then(|config| config.image)
      .with_context(|| {
        format!("container {container} has no image reference")
      })
      .with_kind(ErrorKind::NotFound)
  }
}
