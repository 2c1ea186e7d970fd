use std::time::Duration;

use armada_client::{
  api::container::*,
  entities::{
    Ack, ExecResult,
    docker::{
      container::{
        ContainerDetails, ContainerInfo, ContainerStatsRow,
        ContainerState, LogEntry, ProcessList,
      },
      image::PullResult,
    },
    host::HostConfig,
  },
  error::{AddErrorKind, Error, ErrorKind, Result},
};
use resolver_api::Resolve;

use crate::{
  config::core_config,
  docker::ExecCaps,
  helpers::{
    collect_partial, fan_out, paginate, validate_lines,
    validate_page, validate_timeout_ms,
  },
  state::{docker_client, host_registry},
};

use super::Args;

/// Scan the candidate hosts for a container by name or id prefix.
/// The scan order is the registry order; the first (lowest host
/// name) match wins so repeated calls are deterministic.
pub async fn find_container_host(
  container: &str,
  host: Option<&str>,
) -> Result<&'static HostConfig> {
  validations::validate_container_ref(container)
    .with_kind(ErrorKind::InvalidInput)?;

  if let Some(name) = host {
    return host_registry().find_by_name(name);
  }

  let mut hosts: Vec<&'static HostConfig> =
    host_registry().list().iter().collect();
  hosts.sort_by(|a, b| a.name.cmp(&b.name));

  let outcomes = fan_out(hosts, |host| async move {
    let client = docker_client(host).await?;
    let containers = client.list_containers().await?;
    Ok(containers.into_iter().any(|c| {
      c.name == container || c.id.starts_with(container)
    }))
  })
  .await;

  for outcome in outcomes {
    match outcome.result {
      Ok(true) => return Ok(outcome.item),
      Ok(false) => {}
      Err(e) => {
        debug!(
          "container scan skipped host {} | {e:#}",
          outcome.item.name
        );
      }
    }
  }

  Err(Error::msg(
    ErrorKind::NotFound,
    format!("container '{container}' was not found on any host"),
  ))
}

async fn container_action(
  container: &str,
  host: Option<&str>,
  action: &'static str,
) -> Result<Ack> {
  let host = find_container_host(container, host).await?;
  let client = docker_client(host).await?;
  match action {
    "start" => client.start_container(container).await?,
    "stop" => client.stop_container(container).await?,
    "restart" => client.restart_container(container).await?,
    "pause" => client.pause_container(container).await?,
    "unpause" => client.unpause_container(container).await?,
    _ => unreachable!("unhandled container action {action}"),
  }
  Ok(Ack {
    host: host.name.clone(),
    subject: container.to_string(),
    action: action.to_string(),
  })
}

impl Resolve<Args> for ContainerList {
  #[instrument("ContainerList", skip_all, fields(id = args.id.to_string()))]
  async fn resolve(
    self,
    args: &Args,
  ) -> Result<Vec<ContainerInfo>> {
    validate_page(self.limit, self.offset)?;
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;

    let outcomes = fan_out(hosts, |host| async move {
      docker_client(host).await?.list_containers().await
    })
    .await;
    let mut containers: Vec<ContainerInfo> =
      collect_partial("container list", outcomes)
        .into_iter()
        .flatten()
        .collect();

    if let Some(state) = self.state {
      containers.retain(|c| c.state == state);
    }
    if let Some(name) = &self.name {
      containers.retain(|c| c.name.contains(name.as_str()));
    }
    if let Some(image) = &self.image {
      containers.retain(|c| c.image.contains(image.as_str()));
    }
    if let Some(label) = &self.label {
      let (key, value) = match label.split_once('=') {
        Some((key, value)) => (key, Some(value)),
        None => (label.as_str(), None),
      };
      containers.retain(|c| match (c.labels.get(key), value) {
        (Some(have), Some(want)) => have == want,
        (Some(_), None) => true,
        (None, _) => false,
      });
    }

    // Stable order before pagination, independent of completion
    // order across hosts.
    containers
      .sort_by(|a, b| (&a.host, &a.name).cmp(&(&b.host, &b.name)));
    Ok(paginate(containers, self.limit, self.offset))
  }
}

impl Resolve<Args> for ContainerStart {
  async fn resolve(self, _: &Args) -> Result<Ack> {
    container_action(&self.container, self.host.as_deref(), "start")
      .await
  }
}

impl Resolve<Args> for ContainerStop {
  async fn resolve(self, _: &Args) -> Result<Ack> {
    container_action(&self.container, self.host.as_deref(), "stop")
      .await
  }
}

impl Resolve<Args> for ContainerRestart {
  async fn resolve(self, _: &Args) -> Result<Ack> {
    container_action(
      &self.container,
      self.host.as_deref(),
      "restart",
    )
    .await
  }
}

impl Resolve<Args> for ContainerPause {
  async fn resolve(self, _: &Args) -> Result<Ack> {
    container_action(&self.container, self.host.as_deref(), "pause")
      .await
  }
}

impl Resolve<Args> for ContainerUnpause {
  async fn resolve(self, _: &Args) -> Result<Ack> {
    container_action(
      &self.container,
      self.host.as_deref(),
      "unpause",
    )
    .await
  }
}

impl Resolve<Args> for ContainerLogs {
  async fn resolve(self, _: &Args) -> Result<Vec<LogEntry>> {
    validate_lines(self.lines)?;
    let host =
      find_container_host(&self.container, self.host.as_deref())
        .await?;
    docker_client(host)
      .await?
      .container_logs(
        &self.container,
        self.lines,
        self.timestamps,
        self.grep.as_deref(),
      )
      .await
  }
}

impl Resolve<Args> for ContainerStats {
  #[instrument("ContainerStats", skip_all, fields(id = args.id.to_string()))]
  async fn resolve(
    self,
    args: &Args,
  ) -> Result<Vec<ContainerStatsRow>> {
    if let Some(container) = &self.container {
      let host =
        find_container_host(container, self.host.as_deref())
          .await?;
      let row = docker_client(host)
        .await?
        .container_stats(container)
        .await?;
      return Ok(vec![row]);
    }

    // Aggregate mode: every running container on the selected
    // hosts, failed samples dropped with a warning.
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let client = docker_client(host).await?;
      let running: Vec<String> = client
        .list_containers()
        .await?
        .into_iter()
        .filter(|c| c.state == ContainerState::Running)
        .map(|c| c.name)
        .collect();
      let samples = fan_out(running, |name| {
        let client = client.clone();
        async move { client.container_stats(&name).await }
      })
      .await;
      Ok(collect_partial("container stats", samples))
    })
    .await;

    let mut rows: Vec<ContainerStatsRow> =
      collect_partial("container stats", outcomes)
        .into_iter()
        .flatten()
        .collect();
    rows.sort_by(|a, b| (&a.host, &a.name).cmp(&(&b.host, &b.name)));
    Ok(rows)
  }
}

impl Resolve<Args> for ContainerInspect {
  async fn resolve(self, _: &Args) -> Result<ContainerDetails> {
    let host =
      find_container_host(&self.container, self.host.as_deref())
        .await?;
    docker_client(host)
      .await?
      .inspect_container(&self.container)
      .await
  }
}

impl Resolve<Args> for ContainerSearch {
  async fn resolve(self, _: &Args) -> Result<Vec<ContainerInfo>> {
    validate_page(self.limit, self.offset)?;
    if self.query.is_empty() {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        "'query' must not be empty",
      ));
    }
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      docker_client(host).await?.list_containers().await
    })
    .await;
    let mut containers: Vec<ContainerInfo> =
      collect_partial("container search", outcomes)
        .into_iter()
        .flatten()
        .filter(|c| {
          c.name.contains(&self.query)
            || c.image.contains(&self.query)
        })
        .collect();
    containers
      .sort_by(|a, b| (&a.host, &a.name).cmp(&(&b.host, &b.name)));
    Ok(paginate(containers, self.limit, self.offset))
  }
}

impl Resolve<Args> for ContainerPull {
  async fn resolve(self, _: &Args) -> Result<PullResult> {
    let host =
      find_container_host(&self.container, self.host.as_deref())
        .await?;
    let client = docker_client(host).await?;
    let image = client.container_image(&self.container).await?;
    super::image::pull_with_dedup(host, &image).await
  }
}

impl Resolve<Args> for ContainerRecreate {
  #[instrument(
    "ContainerRecreate",
    skip_all,
    fields(id = args.id.to_string(), container = self.container)
  )]
  async fn resolve(self, args: &Args) -> Result<Ack> {
    let host =
      find_container_host(&self.container, self.host.as_deref())
        .await?;
    docker_client(host)
      .await?
      .recreate_container(&self.container, self.pull)
      .await?;
    Ok(Ack {
      host: host.name.clone(),
      subject: self.container,
      action: String::from("recreate"),
    })
  }
}

impl Resolve<Args> for ContainerExec {
  async fn resolve(self, _: &Args) -> Result<ExecResult> {
    let command = validations::validate_command(&self.command)
      .with_kind(ErrorKind::InvalidInput)?;
    validate_timeout_ms(self.timeout_ms)?;

    let host =
      find_container_host(&self.container, self.host.as_deref())
        .await?;
    let config = core_config();
    let caps = ExecCaps {
      timeout: Duration::from_millis(
        self
          .timeout_ms
          .unwrap_or(config.exec_timeout_secs * 1000),
      ),
      max_buffer_bytes: config.max_buffer_bytes,
    };
    docker_client(host)
      .await?
      .exec_container(&self.container, command, caps)
      .await
  }
}

impl Resolve<Args> for ContainerTop {
  async fn resolve(self, _: &Args) -> Result<ProcessList> {
    let host =
      find_container_host(&self.container, self.host.as_deref())
        .await?;
    docker_client(host).await?.top(&self.container).await
  }
}
