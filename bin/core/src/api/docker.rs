use armada_client::{
  api::docker::*,
  entities::{
    Ack, ExecResult,
    docker::{
      EngineDiskUsage, EngineInfo, PruneRow, PruneTarget,
      image::{ImageInfo, PullResult},
      network::NetworkInfo,
      volume::VolumeInfo,
    },
    host::HostConfig,
  },
  error::{Error, ErrorKind, Result},
};
use resolver_api::Resolve;

use crate::{
  exec::{default_exec_opts, exec_checked},
  helpers::{collect_partial, fan_out},
  state::{docker_client, host_registry},
};

use super::Args;

impl Resolve<Args> for DockerInfo {
  async fn resolve(self, _: &Args) -> Result<Vec<EngineInfo>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      docker_client(host).await?.info().await
    })
    .await;
    let mut infos = collect_partial("docker info", outcomes);
    infos.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(infos)
  }
}

impl Resolve<Args> for DockerDf {
  async fn resolve(
    self,
    _: &Args,
  ) -> Result<Vec<EngineDiskUsage>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      docker_client(host).await?.disk_usage().await
    })
    .await;
    let mut rows = collect_partial("docker df", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for DockerPrune {
  #[instrument(
    "DockerPrune",
    skip_all,
    fields(id = args.id.to_string())
  )]
  async fn resolve(self, args: &Args) -> Result<Vec<PruneRow>> {
    // Destructive: explicit confirmation or nothing happens.
    if !self.force {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        "prune requires 'force: true'",
      ));
    }
    let targets = if self.targets.is_empty() {
      PruneTarget::all()
    } else {
      self.targets.clone()
    };
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;

    // Aggregate mode: every (host, target) outcome is a row, and a
    // single target's failure never fails the request.
    let outcomes = fan_out(hosts, |host| {
      let targets = targets.clone();
      async move {
        let mut rows = Vec::with_capacity(targets.len());
        for target in targets {
          rows.push(prune_one(host, target).await);
        }
        Ok(rows)
      }
    })
    .await;

    let mut rows = Vec::new();
    for outcome in outcomes {
      match outcome.result {
        Ok(host_rows) => rows.extend(host_rows),
        // prune_one captures its own failures; this arm keeps the
        // aggregate contract should the fan-out itself error.
        Err(e) => {
          for target in &targets {
            rows.push(PruneRow {
              host: outcome.item.name.clone(),
              target: *target,
              items_deleted: 0,
              space_reclaimed_bytes: 0,
              error: Some(e.message()),
            });
          }
        }
      }
    }
    rows.sort_by(|a, b| {
      (&a.host, a.target.to_string())
        .cmp(&(&b.host, b.target.to_string()))
    });
    Ok(rows)
  }
}

async fn prune_one(
  host: &HostConfig,
  target: PruneTarget,
) -> PruneRow {
  let outcome: Result<(u64, u64)> = async {
    match target {
      PruneTarget::Containers => {
        docker_client(host).await?.prune_containers().await
      }
      PruneTarget::Images => {
        docker_client(host).await?.prune_images().await
      }
      PruneTarget::Networks => {
        docker_client(host).await?.prune_networks().await
      }
      PruneTarget::Volumes => {
        docker_client(host).await?.prune_volumes().await
      }
      // The Engine has no builder-cache prune in this client's
      // surface; go through the cli on exec-capable hosts.
      PruneTarget::BuildCache => {
        let res = exec_checked(
          host,
          "docker",
          &[
            String::from("builder"),
            String::from("prune"),
            String::from("-f"),
          ],
          &default_exec_opts(),
        )
        .await?;
        Ok((0, parse_reclaimed_bytes(&res.stdout)))
      }
    }
  }
  .await;

  match outcome {
    Ok((items_deleted, space_reclaimed_bytes)) => PruneRow {
      host: host.name.clone(),
      target,
      items_deleted,
      space_reclaimed_bytes,
      error: None,
    },
    Err(e) => PruneRow {
      host: host.name.clone(),
      target,
      items_deleted: 0,
      space_reclaimed_bytes: 0,
      error: Some(e.message()),
    },
  }
}

/// `Total reclaimed space: 1.234GB` from the builder prune cli
/// output.
fn parse_reclaimed_bytes(stdout: &str) -> u64 {
  let line = stdout
    .lines()
    .find(|line| line.starts_with("Total reclaimed space:"));
  let Some(value) =
    line.and_then(|l| l.split(':').nth(1)).map(str::trim)
  else {
    return 0;
  };
  parse_human_size(value)
}

fn parse_human_size(value: &str) -> u64 {
  let digits_end = value
    .find(|c: char| !c.is_ascii_digit() && c != '.')
    .unwrap_or(value.len());
  let Ok(number) = value[..digits_end].parse::<f64>() else {
    return 0;
  };
  let unit = value[digits_end..].trim();
  let factor: f64 = match unit.to_ascii_uppercase().as_str() {
    "" | "B" => 1.0,
    "KB" => 1e3,
    "MB" => 1e6,
    "GB" => 1e9,
    "TB" => 1e12,
    "KIB" => 1024.0,
    "MIB" => 1024.0 * 1024.0,
    "GIB" => 1024.0 * 1024.0 * 1024.0,
    _ => return 0,
  };
  (number * factor) as u64
}

impl Resolve<Args> for DockerImages {
  async fn resolve(self, _: &Args) -> Result<Vec<ImageInfo>> {
    super::image::list_images_impl(
      self.host.as_deref(),
      self.limit,
      self.offset,
    )
    .await
  }
}

impl Resolve<Args> for DockerPull {
  async fn resolve(self, _: &Args) -> Result<Vec<PullResult>> {
    super::image::pull_impl(&self.image, self.host.as_deref())
      .await
  }
}

impl Resolve<Args> for DockerBuild {
  async fn resolve(self, _: &Args) -> Result<ExecResult> {
    super::image::build_impl(
      &self.tag,
      &self.context_path,
      self.dockerfile_path.as_deref(),
      self.host.as_deref(),
    )
    .await
  }
}

impl Resolve<Args> for DockerRmi {
  async fn resolve(self, _: &Args) -> Result<Vec<Ack>> {
    super::image::remove_impl(
      &self.image,
      self.host.as_deref(),
      self.force,
    )
    .await
  }
}

impl Resolve<Args> for DockerNetworks {
  async fn resolve(self, _: &Args) -> Result<Vec<NetworkInfo>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      docker_client(host).await?.list_networks().await
    })
    .await;
    let mut networks: Vec<NetworkInfo> =
      collect_partial("docker networks", outcomes)
        .into_iter()
        .flatten()
        .collect();
    networks
      .sort_by(|a, b| (&a.host, &a.name).cmp(&(&b.host, &b.name)));
    Ok(networks)
  }
}

impl Resolve<Args> for DockerVolumes {
  async fn resolve(self, _: &Args) -> Result<Vec<VolumeInfo>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      docker_client(host).await?.list_volumes().await
    })
    .await;
    let mut volumes: Vec<VolumeInfo> =
      collect_partial("docker volumes", outcomes)
        .into_iter()
        .flatten()
        .collect();
    volumes
      .sort_by(|a, b| (&a.host, &a.name).cmp(&(&b.host, &b.name)));
    Ok(volumes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reclaimed_bytes_parsing() {
    assert_eq!(
      parse_reclaimed_bytes(
        "Deleted build cache objects:\nabc\n\nTotal reclaimed space: 1.5GB\n"
      ),
      1_500_000_000
    );
    assert_eq!(
      parse_reclaimed_bytes("Total reclaimed space: 0B"),
      0
    );
    assert_eq!(
      parse_reclaimed_bytes("Total reclaimed space: 512MiB"),
      512 * 1024 * 1024
    );
    assert_eq!(parse_reclaimed_bytes("no such line"), 0);
  }
}
