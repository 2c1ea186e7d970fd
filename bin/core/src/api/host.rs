use armada_client::{
  api::host::*,
  entities::host::{
    DoctorCheck, DoctorReport, HostConfig, HostInfo, HostMounts,
    HostNetwork, HostPorts, HostResources, HostServices,
    HostStatus, HostUptime,
  },
  error::Result,
};
use resolver_api::Resolve;

use crate::{
  exec::{default_exec_opts, exec_checked},
  helpers::{collect_partial, fan_out},
  host::{parse, resources, uptime},
  state::{docker_client, host_registry},
};

use super::Args;

fn args(list: &[&str]) -> Vec<String> {
  list.iter().map(|s| s.to_string()).collect()
}

impl Resolve<Args> for HostStatusRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostStatus>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      match docker_client(host).await {
        Ok(client) => Ok(client.status().await),
        Err(e) => Ok(HostStatus {
          host: host.name.clone(),
          reachable: false,
          error: Some(e.message()),
          ..Default::default()
        }),
      }
    })
    .await;
    let mut statuses = collect_partial("host status", outcomes);
    statuses.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(statuses)
  }
}

impl Resolve<Args> for HostResourcesRequest {
  #[instrument(
    "HostResources",
    skip_all,
    fields(id = args.id.to_string())
  )]
  async fn resolve(
    self,
    args: &Args,
  ) -> Result<Vec<HostResources>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes =
      fan_out(hosts, |host| async move { resources(host).await })
        .await;
    let mut rows = collect_partial("host resources", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for HostInfoRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostInfo>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let info = docker_client(host).await?.info().await?;
      Ok(HostInfo {
        host: info.host,
        engine_version: info.server_version,
        os: info.operating_system,
        kernel_version: info.kernel_version,
        architecture: info.architecture,
        cpus: info.ncpu,
        memory_bytes: info.mem_total,
        storage_driver: info.storage_driver,
        containers: info.containers,
        containers_running: info.containers_running,
        images: info.images,
      })
    })
    .await;
    let mut infos = collect_partial("host info", outcomes);
    infos.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(infos)
  }
}

impl Resolve<Args> for HostUptimeRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostUptime>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes =
      fan_out(hosts, |host| async move { uptime(host).await })
        .await;
    let mut rows = collect_partial("host uptime", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for HostServicesRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostServices>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let res = exec_checked(
        host,
        "systemctl",
        &args(&[
          "list-units",
          "--type=service",
          "--state=running",
          "--plain",
          "--no-legend",
          "--no-pager",
        ]),
        &default_exec_opts(),
      )
      .await?;
      Ok(HostServices {
        host: host.name.clone(),
        services: parse::parse_services(&res.stdout),
      })
    })
    .await;
    let mut rows = collect_partial("host services", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for HostNetworkRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostNetwork>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let res = exec_checked(
        host,
        "ip",
        &args(&["-json", "addr"]),
        &default_exec_opts(),
      )
      .await?;
      Ok(HostNetwork {
        host: host.name.clone(),
        interfaces: parse::parse_interfaces(&res.stdout),
      })
    })
    .await;
    let mut rows = collect_partial("host network", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for HostMountsRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostMounts>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let res = exec_checked(
        host,
        "findmnt",
        &args(&["-rn", "-o", "TARGET,SOURCE,FSTYPE,OPTIONS"]),
        &default_exec_opts(),
      )
      .await?;
      Ok(HostMounts {
        host: host.name.clone(),
        mounts: parse::parse_mounts(&res.stdout),
      })
    })
    .await;
    let mut rows = collect_partial("host mounts", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for HostPortsRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostPorts>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let res = exec_checked(
        host,
        "ss",
        &args(&["-tulnH"]),
        &default_exec_opts(),
      )
      .await?;
      Ok(HostPorts {
        host: host.name.clone(),
        ports: parse::parse_ports(&res.stdout),
      })
    })
    .await;
    let mut rows = collect_partial("host ports", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for HostDoctor {
  #[instrument(
    "HostDoctor",
    skip_all,
    fields(id = args.id.to_string())
  )]
  async fn resolve(self, args: &Args) -> Result<Vec<DoctorReport>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      Ok(doctor(host).await)
    })
    .await;
    let mut reports = collect_partial("host doctor", outcomes);
    reports.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(reports)
  }
}

/// The check battery. Failures are rows, never request errors.
async fn doctor(host: &HostConfig) -> DoctorReport {
  let mut checks = Vec::new();

  // Engine reachability.
  let engine = async {
    docker_client(host).await?.ping().await
  }
  .await;
  checks.push(match engine {
    Ok(()) => DoctorCheck {
      check: String::from("engine"),
      ok: true,
      detail: String::from("Engine responded to ping"),
    },
    Err(e) => DoctorCheck {
      check: String::from("engine"),
      ok: false,
      detail: e.message(),
    },
  });

  // Command execution path (ssh or local).
  let exec = exec_checked(
    host,
    "echo",
    &args(&["ok"]),
    &default_exec_opts(),
  )
  .await;
  checks.push(match exec {
    Ok(_) => DoctorCheck {
      check: String::from("exec"),
      ok: true,
      detail: if host.is_ssh_execution() {
        String::from("ssh execution path healthy")
      } else {
        String::from("local execution path healthy")
      },
    },
    Err(e) => DoctorCheck {
      check: String::from("exec"),
      ok: false,
      detail: e.message(),
    },
  });

  // Disk headroom and load, from the resources probe.
  match resources(host).await {
    Ok(res) => {
      let full = res
        .disks
        .iter()
        .filter(|disk| {
          disk.total_bytes > 0
            && disk.used_bytes as f64 / disk.total_bytes as f64
              > 0.9
        })
        .map(|disk| disk.mount.clone())
        .collect::<Vec<_>>();
      checks.push(DoctorCheck {
        check: String::from("disk"),
        ok: full.is_empty(),
        detail: if full.is_empty() {
          String::from("all filesystems under 90%")
        } else {
          format!("filesystems over 90%: {}", full.join(", "))
        },
      });

      let cores = res.cores.max(1) as f64;
      let overloaded = res.load_average[0] > cores * 2.0;
      checks.push(DoctorCheck {
        check: String::from("load"),
        ok: !overloaded,
        detail: format!(
          "load {:.2} across {} core(s)",
          res.load_average[0], res.cores
        ),
      });
    }
    Err(e) => checks.push(DoctorCheck {
      check: String::from("resources"),
      ok: false,
      detail: e.message(),
    }),
  }

  DoctorReport {
    host: host.name.clone(),
    checks,
  }
}
