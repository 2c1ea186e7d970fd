use std::time::Duration;

use armada_client::{
  api::compose::*,
  entities::{
    ExecResult, armada_timestamp,
    compose::{
      CachedProject, ComposeActionResponse, ComposePsItem,
      ComposeProjectInfo, ComposeRecreateResponse,
      DiscoveredProject, DiscoverySource, HostDiscovery,
    },
    host::HostConfig,
  },
  error::{AddErrorKind, Error, ErrorKind, Result},
};
use command::ExecOpts;
use resolver_api::Resolve;

use crate::{
  compose::{
    discovery::{
      list_host_projects, resolve_host_project,
    },
    run_compose, scan,
  },
  config::core_config,
  exec::default_exec_opts,
  helpers::{collect_partial, fan_out, validate_lines},
  state::{discovery_cache, host_registry},
};

use super::Args;

fn validate_compose_inputs(
  project: &str,
  services: &[String],
  extra_args: &[String],
) -> Result<()> {
  validations::validate_project_name(project)
    .with_kind(ErrorKind::InvalidInput)?;
  for service in services {
    validations::validate_service_name(service)
      .with_kind(ErrorKind::InvalidInput)?;
  }
  validations::validate_args(extra_args)
    .with_kind(ErrorKind::InvalidInput)?;
  Ok(())
}

/// up / build / pull move images and can far outlive the default
/// command deadline.
fn long_opts() -> ExecOpts {
  default_exec_opts()
    .timeout(Duration::from_secs(core_config().build_timeout_secs))
}

fn ensure_success(
  host: &HostConfig,
  project: &str,
  operation: &str,
  res: ExecResult,
) -> Result<ExecResult> {
  if res.success {
    Ok(res)
  } else {
    Err(
      Error::msg(ErrorKind::RemoteFailure, res.combined()).context(
        format!(
          "compose {operation} failed for project '{project}' on host {}",
          host.name
        ),
      ),
    )
  }
}

impl Resolve<Args> for ComposeList {
  async fn resolve(
    self,
    _: &Args,
  ) -> Result<Vec<ComposeProjectInfo>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      // Live listing first; fall back to the filesystem scan for
      // hosts where the compose plugin is unavailable.
      match list_host_projects(host).await {
        Ok(projects) => Ok(projects),
        Err(e) => {
          debug!(
            "compose ls failed on host {}, scanning instead | {e:#}",
            host.name
          );
          let scanned = scan::scan_host(host).await?;
          Ok(
            scanned
              .into_iter()
              .map(|p| ComposeProjectInfo {
                host: p.host,
                name: p.project,
                status: None,
                compose_files: vec![p.compose_file_path],
              })
              .collect(),
          )
        }
      }
    })
    .await;
    let mut projects: Vec<ComposeProjectInfo> =
      collect_partial("compose list", outcomes)
        .into_iter()
        .flatten()
        .collect();
    projects
      .sort_by(|a, b| (&a.host, &a.name).cmp(&(&b.host, &b.name)));
    Ok(projects)
  }
}

impl Resolve<Args> for ComposeStatus {
  async fn resolve(self, _: &Args) -> Result<Vec<ComposePsItem>> {
    validate_compose_inputs(&self.project, &[], &[])?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let res = run_compose(
      host,
      &found,
      &["ps", "--all", "--format", "json"],
      &[],
      &[],
      &default_exec_opts(),
    )
    .await?;
    let res =
      ensure_success(host, &self.project, "status", res)?;
    Ok(parse_compose_ps(&res.stdout))
  }
}

/// `docker compose ps --format json` emits one object per line on
/// current releases and a single array on older ones.
fn parse_compose_ps(stdout: &str) -> Vec<ComposePsItem> {
  let trimmed = stdout.trim();
  if trimmed.is_empty() {
    return Vec::new();
  }
  if let Ok(items) =
    serde_json::from_str::<Vec<ComposePsItem>>(trimmed)
  {
    return items;
  }
  trimmed
    .lines()
    .filter_map(|line| serde_json::from_str(line).ok())
    .collect()
}

impl Resolve<Args> for ComposeUp {
  #[instrument(
    "ComposeUp",
    skip_all,
    fields(id = args.id.to_string(), project = self.project)
  )]
  async fn resolve(
    self,
    args: &Args,
  ) -> Result<ComposeActionResponse> {
    validate_compose_inputs(
      &self.project,
      &self.services,
      &self.extra_args,
    )?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let res = run_compose(
      host,
      &found,
      &["up", "-d"],
      &self.extra_args,
      &self.services,
      &long_opts(),
    )
    .await?;
    let output = ensure_success(host, &self.project, "up", res)?;
    info!(
      "compose up succeeded for project '{}' on host {}",
      self.project, host.name
    );
    Ok(ComposeActionResponse {
      host: host.name.clone(),
      project: self.project,
      compose_file: found.compose_file_path,
      output,
    })
  }
}

impl Resolve<Args> for ComposeDown {
  #[instrument(
    "ComposeDown",
    skip_all,
    fields(id = args.id.to_string(), project = self.project)
  )]
  async fn resolve(
    self,
    args: &Args,
  ) -> Result<ComposeActionResponse> {
    validate_compose_inputs(
      &self.project,
      &self.services,
      &self.extra_args,
    )?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let res = run_compose(
      host,
      &found,
      &["down"],
      &self.extra_args,
      &self.services,
      &default_exec_opts(),
    )
    .await?;
    let output =
      ensure_success(host, &self.project, "down", res)?;
    Ok(ComposeActionResponse {
      host: host.name.clone(),
      project: self.project,
      compose_file: found.compose_file_path,
      output,
    })
  }
}

impl Resolve<Args> for ComposeRestart {
  async fn resolve(
    self,
    _: &Args,
  ) -> Result<ComposeActionResponse> {
    validate_compose_inputs(&self.project, &self.services, &[])?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let res = run_compose(
      host,
      &found,
      &["restart"],
      &[],
      &self.services,
      &default_exec_opts(),
    )
    .await?;
    let output =
      ensure_success(host, &self.project, "restart", res)?;
    Ok(ComposeActionResponse {
      host: host.name.clone(),
      project: self.project,
      compose_file: found.compose_file_path,
      output,
    })
  }
}

impl Resolve<Args> for ComposeLogs {
  async fn resolve(self, _: &Args) -> Result<ExecResult> {
    validate_compose_inputs(&self.project, &self.services, &[])?;
    validate_lines(self.tail)?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let tail = self.tail.to_string();
    let mut subcommand = vec!["logs", "--tail", tail.as_str()];
    if self.timestamps {
      subcommand.push("--timestamps");
    }
    let res = run_compose(
      host,
      &found,
      &subcommand,
      &[],
      &self.services,
      &default_exec_opts(),
    )
    .await?;
    ensure_success(host, &self.project, "logs", res)
  }
}

impl Resolve<Args> for ComposeBuild {
  async fn resolve(
    self,
    _: &Args,
  ) -> Result<ComposeActionResponse> {
    validate_compose_inputs(
      &self.project,
      &self.services,
      &self.extra_args,
    )?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let res = run_compose(
      host,
      &found,
      &["build"],
      &self.extra_args,
      &self.services,
      &long_opts(),
    )
    .await?;
    let output =
      ensure_success(host, &self.project, "build", res)?;
    Ok(ComposeActionResponse {
      host: host.name.clone(),
      project: self.project,
      compose_file: found.compose_file_path,
      output,
    })
  }
}

impl Resolve<Args> for ComposePull {
  async fn resolve(
    self,
    _: &Args,
  ) -> Result<ComposeActionResponse> {
    validate_compose_inputs(&self.project, &self.services, &[])?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let res = run_compose(
      host,
      &found,
      &["pull"],
      &[],
      &self.services,
      &long_opts(),
    )
    .await?;
    let output =
      ensure_success(host, &self.project, "pull", res)?;
    Ok(ComposeActionResponse {
      host: host.name.clone(),
      project: self.project,
      compose_file: found.compose_file_path,
      output,
    })
  }
}

impl Resolve<Args> for ComposeRecreate {
  #[instrument(
    "ComposeRecreate",
    skip_all,
    fields(id = args.id.to_string(), project = self.project)
  )]
  async fn resolve(
    self,
    args: &Args,
  ) -> Result<ComposeRecreateResponse> {
    validate_compose_inputs(&self.project, &self.services, &[])?;
    let (host, found) =
      resolve_host_project(self.host.as_deref(), &self.project)
        .await?;
    let down = run_compose(
      host,
      &found,
      &["down"],
      &[],
      &self.services,
      &default_exec_opts(),
    )
    .await?;
    let down = ensure_success(host, &self.project, "down", down)?;
    let up = run_compose(
      host,
      &found,
      &["up", "-d"],
      &[],
      &self.services,
      &long_opts(),
    )
    .await?;
    let up = ensure_success(host, &self.project, "up", up)?;
    Ok(ComposeRecreateResponse {
      host: host.name.clone(),
      project: self.project,
      compose_file: found.compose_file_path,
      down,
      up,
    })
  }
}

impl Resolve<Args> for ComposeRefresh {
  #[instrument(
    "ComposeRefresh",
    skip_all,
    fields(id = args.id.to_string())
  )]
  async fn resolve(
    self,
    args: &Args,
  ) -> Result<Vec<DiscoveredProject>> {
    if let Some(project) = &self.project {
      validations::validate_project_name(project)
        .with_kind(ErrorKind::InvalidInput)?;
    }
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;

    let project = self.project.clone();
    let outcomes = fan_out(hosts, |host| {
      let project = project.clone();
      async move { refresh_host(host, project.as_deref()).await }
    })
    .await;
    let mut refreshed: Vec<DiscoveredProject> =
      collect_partial("compose refresh", outcomes)
        .into_iter()
        .flatten()
        .collect();
    refreshed.sort_by(|a, b| {
      (&a.host, &a.project).cmp(&(&b.host, &b.project))
    });
    Ok(refreshed)
  }
}

/// Re-run live discovery + scan for a host, replacing its cache
/// document (or just one project's entry).
async fn refresh_host(
  host: &HostConfig,
  project: Option<&str>,
) -> Result<Vec<DiscoveredProject>> {
  if let Some(project) = project {
    discovery_cache()
      .remove_project(&host.name, project)
      .await
      .with_kind(ErrorKind::RemoteFailure)?;
    let found =
      crate::compose::discovery::resolve_project(host, project)
        .await?;
    return Ok(vec![found]);
  }

  let mut doc = HostDiscovery {
    last_scan: armada_timestamp(),
    search_paths: scan::search_roots(host),
    projects: Default::default(),
  };
  let mut discovered = Vec::new();

  match list_host_projects(host).await {
    Ok(projects) => {
      for project in projects {
        let Some(path) = project.compose_files.first() else {
          continue;
        };
        doc.projects.insert(
          project.name.clone(),
          CachedProject {
            path: path.clone(),
            name: project.name.clone(),
            discovered_from: DiscoverySource::DockerLs,
            last_seen: armada_timestamp(),
          },
        );
        discovered.push(DiscoveredProject {
          host: host.name.clone(),
          project: project.name,
          compose_file_path: path.clone(),
          source: DiscoverySource::DockerLs,
        });
      }
    }
    Err(e) => {
      debug!(
        "compose ls unavailable during refresh on host {} | {e:#}",
        host.name
      );
    }
  }

  for found in scan::scan_host(host).await? {
    if doc.projects.contains_key(&found.project) {
      continue;
    }
    doc.projects.insert(
      found.project.clone(),
      CachedProject {
        path: found.compose_file_path.clone(),
        name: found.project.clone(),
        discovered_from: DiscoverySource::Scan,
        last_seen: armada_timestamp(),
      },
    );
    discovered.push(found);
  }

  discovery_cache()
    .replace_host(&host.name, &doc)
    .await
    .with_kind(ErrorKind::RemoteFailure)?;
  Ok(discovered)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compose_ps_parses_both_shapes() {
    let ndjson = "{\"Name\":\"plex-1\",\"Service\":\"plex\",\"State\":\"running\",\"Status\":\"Up 2 days\",\"Image\":\"plexinc/pms-docker\"}\n{\"Name\":\"plex-db-1\",\"Service\":\"db\",\"State\":\"exited\",\"Status\":\"Exited (0)\",\"Image\":\"postgres\"}\n";
    let items = parse_compose_ps(ndjson);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].service, "plex");

    let array = "[{\"Name\":\"a\",\"Service\":\"a\",\"State\":\"running\",\"Status\":\"\",\"Image\":\"x\"}]";
    assert_eq!(parse_compose_ps(array).len(), 1);

    assert!(parse_compose_ps("").is_empty());
  }
}
