use std::collections::HashMap;

use anyhow::Context;
use armada_client::{
  entities::docker::container::{
    ContainerDetails, ContainerInfo, ContainerState,
    ContainerStatsRow, LogEntry, LogStream, PortSummary,
    ProcessList,
  },
  error::{AddErrorKind, ErrorKind, Result},
};
use bollard::query_parameters::{
  InspectContainerOptions, ListContainersOptions,
  LogsOptionsBuilder, RemoveContainerOptionsBuilder,
  RestartContainerOptions, StartContainerOptions,
  StatsOptionsBuilder, StopContainerOptions, TopOptionsBuilder,
};
use futures::StreamExt;

use super::{DockerClient, classify_docker_err};

impl DockerClient {
  pub async fn list_containers(
    &self,
  ) -> Result<Vec<ContainerInfo>> {
    let containers = self
      .docker
      .list_containers(Some(ListContainersOptions {
        all: true,
        ..Default::default()
      }))
      .await
      .map_err(classify_docker_err)?;

    let mut containers = containers
      .into_iter()
      .flat_map(|container| {
        let name = container
          .names
          .context("no names on container")?
          .pop()
          .context("no names on container (empty vec)")?
          .replace('/', "");
        let network_mode = container
          .host_config
          .and_then(|config| config.network_mode);
        let info = ContainerInfo {
          host: self.host.clone(),
          id: container.id.unwrap_or_default(),
          name,
          image: container.image.unwrap_or_default(),
          state: container
            .state
            .map(convert_summary_state)
            .unwrap_or_default(),
          status: container.status,
          created: container.created,
          ports: summarize_listed_ports(
            container.ports.unwrap_or_default(),
          ),
          networks: container
            .network_settings
            .and_then(|settings| {
              settings.networks.map(|networks| {
                let mut keys =
                  networks.into_keys().collect::<Vec<_>>();
                keys.sort();
                keys
              })
            })
            .unwrap_or_default(),
          labels: container.labels.unwrap_or_default(),
        };
        anyhow::Ok((info, network_mode))
      })
      .collect::<Vec<_>>();

    // Containers joined to another container's namespace report a
    // `container:<id>` network mode and no networks of their own;
    // show the referenced container's networks instead.
    let id_to_networks = containers
      .iter()
      .map(|(c, _)| (c.id.clone(), c.networks.clone()))
      .collect::<HashMap<_, _>>();
    for (container, network_mode) in &mut containers {
      if container.networks.is_empty()
        && let Some(id) = network_mode
          .as_deref()
          .and_then(|mode| mode.strip_prefix("container:"))
        && let Some(networks) = id_to_networks.get(id)
      {
        container.networks = networks.clone();
      }
    }

    Ok(containers.into_iter().map(|(c, _)| c).collect())
  }

  pub async fn inspect_container(
    &self,
    name: &str,
  ) -> Result<ContainerDetails> {
    let container = self
      .docker
      .inspect_container(
        name,
        InspectContainerOptions { size: false }.into(),
      )
      .await
      .map_err(classify_docker_err)?;

    let state = container.state.as_ref();
    let config = container.config;
    let host_config = container.host_config;
    Ok(ContainerDetails {
      host: self.host.clone(),
      id: container.id.unwrap_or_default(),
      name: container
        .name
        .unwrap_or_default()
        .trim_start_matches('/')
        .to_string(),
      image: config
        .as_ref()
        .and_then(|c| c.image.clone())
        .unwrap_or_default(),
      state: state
        .and_then(|s| s.status)
        .map(convert_state_status)
        .unwrap_or_default(),
      status: state.and_then(|s| s.error.clone()),
      created: container.created,
      started_at: state.and_then(|s| s.started_at.clone()),
      exit_code: state.and_then(|s| s.exit_code),
      restart_count: container.restart_count.map(|c| c as i64),
      restart_policy: host_config.as_ref().and_then(|hc| {
        hc.restart_policy
          .as_ref()
          .and_then(|p| p.name.map(|n| format!("{n:?}")))
      }),
      network_mode: host_config
        .as_ref()
        .and_then(|hc| hc.network_mode.clone()),
      ports: container
        .network_settings
        .and_then(|settings| settings.ports)
        .map(summarize_port_bindings)
        .unwrap_or_default(),
      mounts: container
        .mounts
        .unwrap_or_default()
        .into_iter()
        .filter_map(|mount| {
          let source = mount.source?;
          let destination = mount.destination?;
          Some(format!("{source}:{destination}"))
        })
        .collect(),
      env: config
        .as_ref()
        .and_then(|c| c.env.clone())
        .unwrap_or_default(),
      cmd: config
        .as_ref()
        .and_then(|c| c.cmd.clone())
        .unwrap_or_default(),
      entrypoint: config
        .as_ref()
        .and_then(|c| c.entrypoint.clone())
        .unwrap_or_default(),
      labels: config
        .and_then(|c| c.labels)
        .unwrap_or_default(),
    })
  }

  pub async fn start_container(&self, name: &str) -> Result<()> {
    self
      .docker
      .start_container(name, Option::<StartContainerOptions>::None)
      .await
      .map_err(classify_docker_err)?;
    Ok(())
  }

  pub async fn stop_container(&self, name: &str) -> Result<()> {
    self
      .docker
      .stop_container(name, Option::<StopContainerOptions>::None)
      .await
      .map_err(classify_docker_err)?;
    Ok(())
  }

  pub async fn restart_container(&self, name: &str) -> Result<()> {
    self
      .docker
      .restart_container(
        name,
        Option::<RestartContainerOptions>::None,
      )
      .await
      .map_err(classify_docker_err)?;
    Ok(())
  }

  pub async fn pause_container(&self, name: &str) -> Result<()> {
    self
      .docker
      .pause_container(name)
      .await
      .map_err(classify_docker_err)?;
    Ok(())
  }

  pub async fn unpause_container(&self, name: &str) -> Result<()> {
    self
      .docker
      .unpause_container(name)
      .await
      .map_err(classify_docker_err)?;
    Ok(())
  }

  pub async fn remove_container(
    &self,
    name: &str,
    force: bool,
  ) -> Result<()> {
    self
      .docker
      .remove_container(
        name,
        Some(
          RemoveContainerOptionsBuilder::new().force(force).build(),
        ),
      )
      .await
      .map_err(classify_docker_err)?;
    Ok(())
  }

  /// Bounded log retrieval. `lines` is already validated.
  pub async fn container_logs(
    &self,
    name: &str,
    lines: i64,
    timestamps: bool,
    grep: Option<&str>,
  ) -> Result<Vec<LogEntry>> {
    let options = LogsOptionsBuilder::new()
      .stdout(true)
      .stderr(true)
      .timestamps(timestamps)
      .tail(&lines.to_string())
      .build();
    let mut stream = self.docker.logs(name, Some(options));

    let mut entries = Vec::new();
    while let Some(frame) = stream.next().await {
      let frame = frame.map_err(classify_docker_err)?;
      let (stream_kind, message) = match frame {
        bollard::container::LogOutput::StdOut { message }
        | bollard::container::LogOutput::Console { message } => {
          (LogStream::Stdout, message)
        }
        bollard::container::LogOutput::StdErr { message } => {
          (LogStream::Stderr, message)
        }
        bollard::container::LogOutput::StdIn { .. } => continue,
      };
      let text = String::from_utf8_lossy(&message);
      for line in text.lines() {
        if line.is_empty() {
          continue;
        }
        entries.push(parse_log_line(line, stream_kind, timestamps));
      }
    }

    if let Some(grep) = grep {
      entries.retain(|entry| entry.message.contains(grep));
    }
    // The daemon already applied `tail`, but frames can split
    // lines; enforce the bound on the way out.
    let excess = entries.len().saturating_sub(lines as usize);
    if excess > 0 {
      entries.drain(..excess);
    }
    Ok(entries)
  }

  /// One point-in-time stats sample, reduced to a flat row.
  pub async fn container_stats(
    &self,
    name: &str,
  ) -> Result<ContainerStatsRow> {
    let mut stream = self.docker.stats(
      name,
      StatsOptionsBuilder::new().stream(false).build().into(),
    );
    let stats = stream
      .next()
      .await
      .with_context(|| {
        format!("no stats returned for container {name}")
      })
      .with_kind(ErrorKind::RemoteFailure)?
      .map_err(classify_docker_err)?;
    Ok(compute_stats_row(&self.host, name, stats))
  }

  pub async fn top(&self, name: &str) -> Result<ProcessList> {
    let res = self
      .docker
      .top_processes(
        name,
        Some(TopOptionsBuilder::new().ps_args("aux").build()),
      )
      .await
      .map_err(classify_docker_err)?;
    Ok(ProcessList {
      titles: res.titles.unwrap_or_default(),
      rows: res.processes.unwrap_or_default(),
    })
  }

  /// Stop + remove, optionally pull, then re-create with the same
  /// config (host config and networks preserved) and start.
  pub async fn recreate_container(
    &self,
    name: &str,
    pull: bool,
  ) -> Result<()> {
    use bollard::models::{
      ContainerCreateBody, NetworkingConfig,
    };
    use bollard::query_parameters::CreateContainerOptions;

    let inspected = self
      .docker
      .inspect_container(
        name,
        InspectContainerOptions { size: false }.into(),
      )
      .await
      .map_err(classify_docker_err)
      .map_err(|e| {
        e.context(format!("failed to inspect container {name}"))
      })?;

    let config = inspected
      .config
      .context("container has no config to recreate from")?;
    let image = config
      .image
      .clone()
      .context("container has no image to recreate from")?;
    let container_name = inspected
      .name
      .as_deref()
      .unwrap_or(name)
      .trim_start_matches('/')
      .to_string();

    // Stop may fail for containers that are already down.
    let _ = self.stop_container(name).await;
    self.remove_container(name, true).await.map_err(|e| {
      e.context(format!("failed to remove container {name}"))
    })?;

    if pull {
      self.pull_image(&image).await.map_err(|e| {
        e.context(format!("failed to pull image {image}"))
      })?;
    }

    let networking_config = inspected
      .network_settings
      .and_then(|settings| settings.networks)
      .map(|endpoints| NetworkingConfig {
        endpoints_config: Some(endpoints),
      });

    let body = ContainerCreateBody {
      hostname: config.hostname,
      domainname: config.domainname,
      user: config.user,
      exposed_ports: config.exposed_ports,
      tty: config.tty,
      env: config.env,
      cmd: config.cmd,
      healthcheck: config.healthcheck,
      image: Some(image),
      volumes: config.volumes,
      working_dir: config.working_dir,
      entrypoint: config.entrypoint,
      labels: config.labels,
      stop_signal: config.stop_signal,
      stop_timeout: config.stop_timeout,
      host_config: inspected.host_config,
      networking_config,
      ..Default::default()
    };

    self
      .docker
      .create_container(
        Some(CreateContainerOptions {
          name: Some(container_name.clone()),
          ..Default::default()
        }),
        body,
      )
      .await
      .map_err(classify_docker_err)
      .map_err(|e| {
        e.context(format!(
          "failed to re-create container {container_name}"
        ))
      })?;

    self.start_container(&container_name).await.map_err(|e| {
      e.context(format!(
        "failed to start re-created container {container_name}"
      ))
    })
  }
}

fn parse_log_line(
  line: &str,
  stream: LogStream,
  timestamps: bool,
) -> LogEntry {
  if timestamps
    && let Some((timestamp, message)) = line.split_once(' ')
    && timestamp.contains('T')
  {
    return LogEntry {
      timestamp: timestamp.to_string(),
      stream,
      message: message.to_string(),
    };
  }
  LogEntry {
    timestamp: String::new(),
    stream,
    message: line.to_string(),
  }
}

fn convert_summary_state(
  state: bollard::secret::ContainerSummaryStateEnum,
) -> ContainerState {
  use bollard::secret::ContainerSummaryStateEnum as State;
  match state {
    State::EMPTY => ContainerState::Unknown,
    State::CREATED => ContainerState::Created,
    State::RUNNING => ContainerState::Running,
    State::PAUSED => ContainerState::Paused,
    State::RESTARTING => ContainerState::Restarting,
    State::EXITED => ContainerState::Exited,
    State::REMOVING => ContainerState::Removing,
    State::DEAD => ContainerState::Dead,
  }
}

fn convert_state_status(
  state: bollard::secret::ContainerStateStatusEnum,
) -> ContainerState {
  use bollard::secret::ContainerStateStatusEnum as State;
  match state {
    State::EMPTY => ContainerState::Unknown,
    State::CREATED => ContainerState::Created,
    State::RUNNING => ContainerState::Running,
    State::PAUSED => ContainerState::Paused,
    State::RESTARTING => ContainerState::Restarting,
    State::EXITED => ContainerState::Exited,
    State::REMOVING => ContainerState::Removing,
    State::DEAD => ContainerState::Dead,
  }
}

/// Ports from a container listing: one row per
/// `(container port, protocol)`, preferring the first published
/// binding when one exists.
fn summarize_listed_ports(
  ports: Vec<bollard::secret::Port>,
) -> Vec<PortSummary> {
  let mut seen: Vec<PortSummary> = Vec::new();
  for port in ports {
    let protocol = port
      .typ
      .map(|t| format!("{t:?}").to_lowercase())
      .unwrap_or_else(|| String::from("tcp"));
    let existing = seen.iter_mut().find(|p| {
      p.container_port == port.private_port && p.protocol == protocol
    });
    match existing {
      Some(existing) => {
        if existing.host_port.is_none()
          && port.public_port.is_some()
        {
          existing.host_ip = port.ip;
          existing.host_port = port.public_port;
        }
      }
      None => seen.push(PortSummary {
        container_port: port.private_port,
        protocol,
        host_ip: port.ip,
        host_port: port.public_port,
      }),
    }
  }
  seen.sort_by_key(|p| p.container_port);
  seen
}

/// Ports from an inspect's binding map. A port whose binding array
/// mixes null and valid entries is kept, carrying the first valid
/// binding; ports with no valid binding at all are dropped.
pub fn summarize_port_bindings(
  ports: HashMap<
    String,
    Option<Vec<bollard::models::PortBinding>>,
  >,
) -> Vec<PortSummary> {
  let mut summaries = Vec::new();
  for (key, bindings) in ports {
    let (container_port, protocol) = match key.split_once('/') {
      Some((port, protocol)) => (port, protocol),
      None => (key.as_str(), "tcp"),
    };
    let Ok(container_port) = container_port.parse::<u16>() else {
      continue;
    };
    let first_valid =
      bindings.unwrap_or_default().into_iter().find_map(|b| {
        let host_port =
          b.host_port.as_deref()?.parse::<u16>().ok()?;
        Some((b.host_ip, host_port))
      });
    let Some((host_ip, host_port)) = first_valid else {
      continue;
    };
    summaries.push(PortSummary {
      container_port,
      protocol: protocol.to_string(),
      host_ip,
      host_port: Some(host_port),
    });
  }
  summaries.sort_by_key(|p| p.container_port);
  summaries
}

/// Reduce the Engine's cumulative counters to a flat row. The cpu
/// percentage follows the delta formula the cli uses.
pub fn compute_stats_row(
  host: &str,
  name: &str,
  stats: bollard::models::ContainerStatsResponse,
) -> ContainerStatsRow {
  let cpu_percent = (|| {
    let cpu = stats.cpu_stats.as_ref()?;
    let pre = stats.precpu_stats.as_ref()?;
    let cpu_total =
      cpu.cpu_usage.as_ref()?.total_usage.unwrap_or_default();
    let pre_total =
      pre.cpu_usage.as_ref()?.total_usage.unwrap_or_default();
    let system = cpu.system_cpu_usage.unwrap_or_default();
    let pre_system = pre.system_cpu_usage.unwrap_or_default();
    let cpu_delta = cpu_total.saturating_sub(pre_total) as f64;
    let system_delta = system.saturating_sub(pre_system) as f64;
    if system_delta <= 0.0 {
      return None;
    }
    let online = cpu.online_cpus.unwrap_or(1).max(1) as f64;
    Some(cpu_delta / system_delta * online * 100.0)
  })()
  .unwrap_or_default();

  let memory = stats.memory_stats.as_ref();
  let memory_usage =
    memory.and_then(|m| m.usage).unwrap_or_default();
  let memory_limit =
    memory.and_then(|m| m.limit).unwrap_or_default();
  let memory_percent = if memory_limit > 0 {
    memory_usage as f64 / memory_limit as f64 * 100.0
  } else {
    0.0
  };

  let (network_rx_bytes, network_tx_bytes) = stats
    .networks
    .as_ref()
    .map(|networks| {
      networks.values().fold((0u64, 0u64), |(rx, tx), n| {
        (
          rx + n.rx_bytes.unwrap_or_default(),
          tx + n.tx_bytes.unwrap_or_default(),
        )
      })
    })
    .unwrap_or_default();

  let (block_read_bytes, block_write_bytes) = stats
    .blkio_stats
    .as_ref()
    .and_then(|blkio| blkio.io_service_bytes_recursive.as_ref())
    .map(|entries| {
      entries.iter().fold((0u64, 0u64), |(read, write), entry| {
        let value = entry.value.unwrap_or_default();
        match entry.op.as_deref() {
          Some(op) if op.eq_ignore_ascii_case("read") => {
            (read + value, write)
          }
          Some(op) if op.eq_ignore_ascii_case("write") => {
            (read, write + value)
          }
          _ => (read, write),
        }
      })
    })
    .unwrap_or_default();

  ContainerStatsRow {
    host: host.to_string(),
    name: stats
      .name
      .as_deref()
      .unwrap_or(name)
      .trim_start_matches('/')
      .to_string(),
    cpu_percent,
    memory_usage_bytes: memory_usage,
    memory_limit_bytes: memory_limit,
    memory_percent,
    network_rx_bytes,
    network_tx_bytes,
    block_read_bytes,
    block_write_bytes,
    pids: stats
      .pids_stats
      .as_ref()
      .and_then(|p| p.current)
      .unwrap_or_default(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mixed_null_bindings_keep_the_first_valid_one() {
    let ports: HashMap<
      String,
      Option<Vec<bollard::models::PortBinding>>,
    > = serde_json::from_value(serde_json::json!({
      "32400/tcp": [
        { "HostIp": null, "HostPort": null },
        { "HostIp": "0.0.0.0", "HostPort": "32400" },
      ],
      "8324/tcp": null,
      "1900/udp": [
        { "HostIp": "0.0.0.0", "HostPort": "1900" },
      ],
    }))
    .unwrap();

    let summaries = summarize_port_bindings(ports);
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].container_port, 1900);
    assert_eq!(summaries[0].protocol, "udp");
    assert_eq!(summaries[1].container_port, 32400);
    assert_eq!(summaries[1].host_port, Some(32400));
    assert_eq!(
      summaries[1].host_ip.as_deref(),
      Some("0.0.0.0")
    );
  }

  #[test]
  fn ports_without_any_valid_binding_are_dropped() {
    let ports: HashMap<
      String,
      Option<Vec<bollard::models::PortBinding>>,
    > = serde_json::from_value(serde_json::json!({
      "9000/tcp": [ { "HostIp": null, "HostPort": null } ],
    }))
    .unwrap();
    assert!(summarize_port_bindings(ports).is_empty());
  }

  #[test]
  fn stats_row_reduction() {
    let stats: bollard::models::ContainerStatsResponse =
      serde_json::from_value(serde_json::json!({
        "name": "/plex",
        "cpu_stats": {
          "cpu_usage": { "total_usage": 400_000u64 },
          "system_cpu_usage": 1_000_000u64,
          "online_cpus": 4,
        },
        "precpu_stats": {
          "cpu_usage": { "total_usage": 300_000u64 },
          "system_cpu_usage": 600_000u64,
        },
        "memory_stats": { "usage": 512u64, "limit": 2048u64 },
        "networks": {
          "eth0": { "rx_bytes": 100u64, "tx_bytes": 50u64 },
          "eth1": { "rx_bytes": 10u64, "tx_bytes": 5u64 },
        },
        "blkio_stats": {
          "io_service_bytes_recursive": [
            { "op": "Read", "value": 700u64 },
            { "op": "Write", "value": 300u64 },
          ],
        },
        "pids_stats": { "current": 12u64 },
      }))
      .unwrap();

    let row = compute_stats_row("tower", "plex", stats);
    assert_eq!(row.name, "plex");
    // 100k cpu delta over 400k system delta across 4 cpus.
    assert!((row.cpu_percent - 100.0).abs() < 1e-6);
    assert_eq!(row.memory_usage_bytes, 512);
    assert!((row.memory_percent - 25.0).abs() < 1e-6);
    assert_eq!(row.network_rx_bytes, 110);
    assert_eq!(row.network_tx_bytes, 55);
    assert_eq!(row.block_read_bytes, 700);
    assert_eq!(row.block_write_bytes, 300);
    assert_eq!(row.pids, 12);
  }

  #[test]
  fn stats_row_tolerates_missing_sections() {
    let stats: bollard::models::ContainerStatsResponse =
      serde_json::from_value(serde_json::json!({})).unwrap();
    let row = compute_stats_row("tower", "plex", stats);
    assert_eq!(row.cpu_percent, 0.0);
    assert_eq!(row.memory_usage_bytes, 0);
    assert_eq!(row.pids, 0);
  }
}
