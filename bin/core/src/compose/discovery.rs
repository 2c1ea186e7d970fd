//! The layered discovery resolver: cache, then the live daemon's
//! `docker compose ls`, then the filesystem scan, with write-through
//! into the cache and invalidation on stale paths.

use std::time::Duration;

use armada_client::{
  entities::{
    ExecResult, armada_timestamp,
    compose::{
      CachedProject, ComposeProjectInfo, DiscoveredProject,
      DiscoverySource, DockerComposeLsItem,
    },
    host::HostConfig,
  },
  error::{Error, ErrorKind, Result},
};

use crate::{
  compose::scan,
  exec::{default_exec_opts, exec_checked},
  helpers::fan_out,
  state::{discovery_cache, host_registry},
};

/// Wall-clock ceiling for whole-fleet auto-discovery.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// `docker compose ls --all --format json` on one host.
pub async fn list_host_projects(
  host: &HostConfig,
) -> Result<Vec<ComposeProjectInfo>> {
  let res = exec_checked(
    host,
    "docker",
    &[
      String::from("compose"),
      String::from("ls"),
      String::from("--all"),
      String::from("--format"),
      String::from("json"),
    ],
    &default_exec_opts(),
  )
  .await
  .map_err(|e| {
    e.context(format!(
      "failed to list compose projects on host {}",
      host.name
    ))
  })?;

  let items = parse_compose_ls(&res)?;
  Ok(
    items
      .into_iter()
      .map(|item| ComposeProjectInfo {
        host: host.name.clone(),
        compose_files: item.config_file_list(),
        name: item.name,
        status: item.status,
      })
      .collect(),
  )
}

fn parse_compose_ls(
  res: &ExecResult,
) -> Result<Vec<DockerComposeLsItem>> {
  let items: Vec<DockerComposeLsItem> =
    serde_json::from_str(res.stdout.trim()).map_err(|e| {
      Error::new(
        ErrorKind::RemoteFailure,
        anyhow::Error::from(e)
          .context("failed to parse 'docker compose ls' json"),
      )
    })?;
  Ok(
    items
      .into_iter()
      .filter(|item| !item.name.is_empty())
      .collect(),
  )
}

/// Resolve `(host, project)` to a compose file path through the
/// three layers, writing live results through to the cache.
pub async fn resolve_project(
  host: &HostConfig,
  project: &str,
) -> Result<DiscoveredProject> {
  // Cache layer.
  if let Some(entry) =
    discovery_cache().get_project(&host.name, project).await
  {
    return Ok(DiscoveredProject {
      host: host.name.clone(),
      project: project.to_string(),
      compose_file_path: entry.path,
      source: entry.discovered_from,
    });
  }

  // Live daemon layer.
  match list_host_projects(host).await {
    Ok(projects) => {
      let found = projects.into_iter().find(|p| {
        p.name == project && !p.compose_files.is_empty()
      });
      if let Some(found) = found {
        let path = found.compose_files[0].clone();
        write_through(
          host,
          project,
          &path,
          DiscoverySource::DockerLs,
        )
        .await;
        return Ok(DiscoveredProject {
          host: host.name.clone(),
          project: project.to_string(),
          compose_file_path: path,
          source: DiscoverySource::DockerLs,
        });
      }
    }
    Err(e) => {
      debug!(
        "compose ls unavailable on host {}, falling back to scan | {e:#}",
        host.name
      );
    }
  }

  // Scan layer. Cache everything the walk surfaced; the scan cost
  // is already paid.
  let scanned = scan::scan_host(host).await?;
  for found in &scanned {
    write_through(
      host,
      &found.project,
      &found.compose_file_path,
      DiscoverySource::Scan,
    )
    .await;
  }
  if let Some(found) =
    scanned.into_iter().find(|p| p.project == project)
  {
    return Ok(found);
  }

  Err(Error::msg(
    ErrorKind::NotFound,
    format!(
      "project '{project}' was not found on host {} by any discovery layer",
      host.name
    ),
  ))
}

async fn write_through(
  host: &HostConfig,
  project: &str,
  path: &str,
  source: DiscoverySource,
) {
  let entry = CachedProject {
    path: path.to_string(),
    name: project.to_string(),
    discovered_from: source,
    last_seen: armada_timestamp(),
  };
  if let Err(e) = discovery_cache()
    .update_project(&host.name, project, entry)
    .await
  {
    warn!(
      "failed to write discovery cache for host {} | {e:#}",
      host.name
    );
  }
}

/// Locate the host owning `project` by fanning out over the fleet.
/// Zero matches is NotFound, more than one is Ambiguous, and the
/// whole search runs under a 30 s wall-clock ceiling.
pub async fn find_project_host(
  project: &str,
) -> Result<(&'static HostConfig, DiscoveredProject)> {
  let hosts: Vec<&'static HostConfig> =
    host_registry().list().iter().collect();

  let outcomes = tokio::time::timeout(
    DISCOVERY_TIMEOUT,
    fan_out(hosts, |host| async move {
      resolve_project(host, project).await
    }),
  )
  .await
  .map_err(|_| {
    Error::msg(
      ErrorKind::Timeout,
      format!(
        "auto-discovery of project '{project}' exceeded {}s",
        DISCOVERY_TIMEOUT.as_secs()
      ),
    )
  })?;

  let mut matches = Vec::new();
  for outcome in outcomes {
    match outcome.result {
      Ok(found) => matches.push((outcome.item, found)),
      Err(e) if e.kind == ErrorKind::NotFound => {}
      Err(e) => {
        debug!(
          "discovery skipped host {} | {e:#}",
          outcome.item.name
        );
      }
    }
  }

  match matches.len() {
    0 => Err(Error::msg(
      ErrorKind::NotFound,
      format!("project '{project}' was not found on any host"),
    )),
    1 => {
      let (host, found) = matches.remove(0);
      Ok((host, found))
    }
    _ => {
      let mut names: Vec<&str> =
        matches.iter().map(|(host, _)| host.name.as_str()).collect();
      names.sort();
      Err(Error::msg(
        ErrorKind::Ambiguous,
        format!(
          "project '{project}' exists on multiple hosts: {}; specify one",
          names.join(", ")
        ),
      ))
    }
  }
}

/// The compose entrypoint used by every compose handler: validate
/// the project name, honor an explicit host, auto-discover
/// otherwise.
pub async fn resolve_host_project(
  host: Option<&str>,
  project: &str,
) -> Result<(&'static HostConfig, DiscoveredProject)> {
  match host {
    Some(name) => {
      let host = host_registry().find_by_name(name)?;
      let found = resolve_project(host, project).await?;
      Ok((host, found))
    }
    None => find_project_host(project).await,
  }
}

/// Downstream "no such file" means the cached path went stale:
/// drop the entry so the next request re-runs discovery.
pub async fn invalidate_if_missing_file(
  host: &HostConfig,
  project: &str,
  res: &ExecResult,
) {
  if res.success || !mentions_missing_file(res) {
    return;
  }
  info!(
    "invalidating stale compose path for project '{project}' on host {}",
    host.name
  );
  if let Err(e) = discovery_cache()
    .remove_project(&host.name, project)
    .await
  {
    warn!(
      "failed to invalidate discovery cache for host {} | {e:#}",
      host.name
    );
  }
}

pub fn mentions_missing_file(res: &ExecResult) -> bool {
  let needle = |s: &str| {
    let s = s.to_lowercase();
    s.contains("no such file") || s.contains("enoent")
  };
  needle(&res.stderr) || needle(&res.stdout)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_detection() {
    let res = ExecResult {
      stderr: String::from(
        "open /old/path: No such file or directory",
      ),
      success: false,
      exit_code: 14,
      ..Default::default()
    };
    assert!(mentions_missing_file(&res));

    let ok = ExecResult {
      stdout: String::from("started"),
      success: true,
      ..Default::default()
    };
    assert!(!mentions_missing_file(&ok));
  }

  #[test]
  fn compose_ls_parse_skips_nameless() {
    let res = ExecResult {
      stdout: String::from(
        r#"[{"Name":"plex","Status":"running(2)","ConfigFiles":"/stacks/plex/compose.yml"},{"Name":"","ConfigFiles":""}]"#,
      ),
      success: true,
      ..Default::default()
    };
    let items = parse_compose_ls(&res).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "plex");
  }

  #[tokio::test]
  async fn find_project_host_with_empty_registry_is_not_found() {
    // Nothing registered in the test config, so discovery cannot
    // match anywhere.
    let e = find_project_host("plex").await.unwrap_err();
    assert_eq!(e.kind, ErrorKind::NotFound);
  }
}
